use crate::error::{Result, WalletError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Open,
    Deposit,
    Withdrawal,
    Transfer,
    Rollback,
    Close,
}

/// One row of a replay file.
///
/// `user` is the caller and `account` the name of one of their accounts.
/// `counterparty` addresses the destination of a transfer as `user/account`.
/// `reference` labels a money movement so a later `rollback` row can name it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WalletOperation {
    pub op: OperationKind,
    pub user: String,
    pub account: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Reads wallet operations from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<WalletOperation>`. Whitespace is trimmed and trailing empty
/// columns may be omitted.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations.
    pub fn operations(self) -> impl Iterator<Item = Result<WalletOperation>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(WalletError::from))
    }
}
