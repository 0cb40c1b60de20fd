use crate::domain::account::Currency;
use crate::domain::transaction::TransactionId;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification the protocol adapter maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Forbidden,
    NotFound,
    AlreadyExists,
    Internal,
    DeadlineExceeded,
}

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    #[error("currency mismatch: {from} account cannot pay into {to} account")]
    CurrencyMismatch { from: Currency, to: Currency },
    #[error("source and destination accounts are the same")]
    SelfTransfer,
    #[error("transaction {0} is not a transfer and cannot be rolled back")]
    NotReversible(TransactionId),
    #[error("transaction {0} has already been rolled back")]
    AlreadyRolledBack(TransactionId),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),
    #[error("commit failed: {0}")]
    CommitFailed(#[source] BoxError),
    #[error("rollback failed ({failure}) while handling: {cause}")]
    RollbackFailed {
        cause: Box<WalletError>,
        #[source]
        failure: BoxError,
    },
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_)
            | Self::InsufficientFunds { .. }
            | Self::CurrencyMismatch { .. }
            | Self::SelfTransfer
            | Self::NotReversible(_)
            | Self::AlreadyRolledBack(_) => ErrorKind::InvalidArgument,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            Self::Storage(_)
            | Self::CommitFailed(_)
            | Self::RollbackFailed { .. }
            | Self::Csv(_)
            | Self::Io(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        Self::Storage(Box::new(error))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for WalletError {
    fn from(error: rocksdb::Error) -> Self {
        Self::Storage(Box::new(error))
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_business_rejections_as_invalid_argument() {
        let id = TransactionId::new();
        for error in [
            WalletError::SelfTransfer,
            WalletError::NotReversible(id),
            WalletError::AlreadyRolledBack(id),
            WalletError::CurrencyMismatch {
                from: Currency::Usd,
                to: Currency::Eur,
            },
        ] {
            assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_rollback_failure_keeps_both_causes() {
        let error = WalletError::RollbackFailed {
            cause: Box::new(WalletError::NotFound("account".to_string())),
            failure: Box::new(std::io::Error::other("disk gone")),
        };
        assert_eq!(error.kind(), ErrorKind::Internal);
        let rendered = error.to_string();
        assert!(rendered.contains("account not found"));
        assert!(rendered.contains("disk gone"));
    }
}
