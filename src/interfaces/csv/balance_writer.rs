use crate::domain::account::Currency;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// Final balance of one account, as printed by the replay driver.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BalanceRow {
    pub user: String,
    pub account: String,
    pub currency: Currency,
    pub balance: Decimal,
}

/// Writes balance rows as CSV with a header line.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes `rows` sorted by user, then account name.
    pub fn write_balances(&mut self, mut rows: Vec<BalanceRow>) -> Result<()> {
        rows.sort_by(|a, b| (&a.user, &a.account).cmp(&(&b.user, &b.account)));
        if rows.is_empty() {
            self.writer
                .write_record(["user", "account", "currency", "balance"])?;
        }
        for row in rows {
            self.writer.serialize(BalanceRow {
                balance: row.balance.normalize(),
                ..row
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
