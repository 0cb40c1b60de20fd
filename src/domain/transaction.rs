use super::account::{AccountId, Amount};
use crate::error::{Result, WalletError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

uuid_id!(
    /// Globally unique transaction identifier.
    TransactionId,
    "transaction id"
);

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transfer" => Ok(Self::Transfer),
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            _ => Err(WalletError::invalid(format!(
                "unsupported transaction type `{s}`"
            ))),
        }
    }
}

/// Which accounts a transaction moved money between.
///
/// Deposits have no source and withdrawals no destination; only a transfer
/// has a counter-account to reverse against.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer {
        source: AccountId,
        destination: AccountId,
    },
    Deposit {
        destination: AccountId,
    },
    Withdrawal {
        source: AccountId,
    },
}

impl TransactionKind {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Self::Transfer { .. } => TransactionType::Transfer,
            Self::Deposit { .. } => TransactionType::Deposit,
            Self::Withdrawal { .. } => TransactionType::Withdrawal,
        }
    }

    pub fn source(&self) -> Option<AccountId> {
        match *self {
            Self::Transfer { source, .. } | Self::Withdrawal { source } => Some(source),
            Self::Deposit { .. } => None,
        }
    }

    pub fn destination(&self) -> Option<AccountId> {
        match *self {
            Self::Transfer { destination, .. } | Self::Deposit { destination } => {
                Some(destination)
            }
            Self::Withdrawal { .. } => None,
        }
    }

    /// Accounts whose balance this transaction touches.
    pub fn accounts(&self) -> Vec<AccountId> {
        self.source().into_iter().chain(self.destination()).collect()
    }

    pub fn involves(&self, account: AccountId) -> bool {
        self.source() == Some(account) || self.destination() == Some(account)
    }
}

/// Record of a balance-affecting event.
///
/// Immutable once stored, apart from `rolled_back`, which can only move from
/// `false` to `true` and only on transfers.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub rolled_back: bool,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(amount: Amount, kind: TransactionKind) -> Self {
        Self {
            id: TransactionId::new(),
            amount,
            kind,
            rolled_back: false,
            created_at: Utc::now(),
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.kind.transaction_type()
    }

    /// Checks that this transaction may still be reversed.
    pub fn ensure_reversible(&self) -> Result<(AccountId, AccountId)> {
        match self.kind {
            TransactionKind::Transfer {
                source,
                destination,
            } => {
                if self.rolled_back {
                    Err(WalletError::AlreadyRolledBack(self.id))
                } else {
                    Ok((source, destination))
                }
            }
            TransactionKind::Deposit { .. } | TransactionKind::Withdrawal { .. } => {
                Err(WalletError::NotReversible(self.id))
            }
        }
    }

    pub fn mark_rolled_back(&mut self) -> Result<(AccountId, AccountId)> {
        let accounts = self.ensure_reversible()?;
        self.rolled_back = true;
        Ok(accounts)
    }
}

/// Criteria for listing transactions. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub account: Option<AccountId>,
    pub transaction_type: Option<TransactionType>,
    pub rolled_back: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn for_account(account: AccountId) -> Self {
        Self {
            account: Some(account),
            ..Self::default()
        }
    }

    pub fn of_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    pub fn rolled_back(mut self, rolled_back: bool) -> Self {
        self.rolled_back = Some(rolled_back);
        self
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.account.is_none_or(|account| tx.kind.involves(account))
            && self
                .transaction_type
                .is_none_or(|ty| tx.transaction_type() == ty)
            && self.rolled_back.is_none_or(|flag| tx.rolled_back == flag)
            && self.since.is_none_or(|since| tx.created_at >= since)
            && self.until.is_none_or(|until| tx.created_at < until)
    }

    /// Filters, orders newest first and truncates to the limit.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Transaction>) -> Vec<Transaction> {
        let mut selected: Vec<Transaction> =
            rows.into_iter().filter(|tx| self.matches(tx)).cloned().collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amount() -> Amount {
        Amount::new(dec!(5)).unwrap()
    }

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!(
            "Transfer".parse::<TransactionType>().unwrap(),
            TransactionType::Transfer
        );
        assert!(matches!(
            "refund".parse::<TransactionType>(),
            Err(WalletError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_transaction_id_parsing() {
        let id = TransactionId::new();
        assert_eq!(format!(" {id} ").parse::<TransactionId>().unwrap(), id);
        assert!(matches!(
            "not-a-uuid".parse::<TransactionId>(),
            Err(WalletError::InvalidArgument(msg)) if msg.contains("transaction id")
        ));
        assert!("nope".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_kind_accounts() {
        let (a, b) = (AccountId::new(), AccountId::new());
        let transfer = TransactionKind::Transfer {
            source: a,
            destination: b,
        };
        assert_eq!(transfer.accounts(), vec![a, b]);
        assert_eq!(TransactionKind::Deposit { destination: b }.source(), None);
        assert_eq!(TransactionKind::Withdrawal { source: a }.destination(), None);
        assert!(transfer.involves(b));
    }

    #[test]
    fn test_only_transfers_can_be_rolled_back_once() {
        let mut transfer = Transaction::new(
            amount(),
            TransactionKind::Transfer {
                source: AccountId::new(),
                destination: AccountId::new(),
            },
        );
        assert!(transfer.mark_rolled_back().is_ok());
        assert!(transfer.rolled_back);
        assert!(matches!(
            transfer.mark_rolled_back(),
            Err(WalletError::AlreadyRolledBack(_))
        ));

        let mut deposit = Transaction::new(
            amount(),
            TransactionKind::Deposit {
                destination: AccountId::new(),
            },
        );
        assert!(matches!(
            deposit.mark_rolled_back(),
            Err(WalletError::NotReversible(_))
        ));
        assert!(!deposit.rolled_back);
    }

    #[test]
    fn test_filter_matches_and_orders() {
        let account = AccountId::new();
        let mut older = Transaction::new(amount(), TransactionKind::Deposit { destination: account });
        older.created_at -= chrono::Duration::seconds(10);
        let newer = Transaction::new(amount(), TransactionKind::Withdrawal { source: account });
        let unrelated = Transaction::new(
            amount(),
            TransactionKind::Deposit {
                destination: AccountId::new(),
            },
        );
        let rows = [older.clone(), newer.clone(), unrelated];

        let all = TransactionFilter::for_account(account).apply(&rows);
        assert_eq!(all, vec![newer.clone(), older.clone()]);

        let deposits = TransactionFilter::for_account(account)
            .of_type(TransactionType::Deposit)
            .apply(&rows);
        assert_eq!(deposits, vec![older]);

        let limited = TransactionFilter::default().limit(1).apply(&rows);
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_kind_serialization_is_tagged() {
        let kind = TransactionKind::Deposit {
            destination: AccountId::new(),
        };
        let json = serde_json::to_value(kind).unwrap();
        assert_eq!(json["type"], "deposit");
        assert!(json.get("source").is_none());
    }
}
