//! Input records handed to the engine by the protocol adapter, and the typed
//! commands the validator turns them into.

use super::account::{Amount, Currency};
use super::card::CardNumber;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Who is calling and how long they are willing to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// External identity, e.g. the subject of a verified token.
    pub identity: String,
    /// Overrides the engine's default operation timeout.
    pub timeout: Option<Duration>,
}

impl CallContext {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateTransactionRequest {
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub from_card: String,
    #[serde(default)]
    pub to_card: Option<String>,
}

impl CreateTransactionRequest {
    pub fn transfer(amount: Decimal, from_card: &CardNumber, to_card: &CardNumber) -> Self {
        Self {
            amount,
            transaction_type: "transfer".to_string(),
            from_card: from_card.to_string(),
            to_card: Some(to_card.to_string()),
        }
    }

    pub fn deposit(amount: Decimal, card: &CardNumber) -> Self {
        Self {
            amount,
            transaction_type: "deposit".to_string(),
            from_card: card.to_string(),
            to_card: None,
        }
    }

    pub fn withdrawal(amount: Decimal, card: &CardNumber) -> Self {
        Self {
            amount,
            transaction_type: "withdrawal".to_string(),
            from_card: card.to_string(),
            to_card: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RollbackRequest {
    pub transaction_id: String,
}

impl RollbackRequest {
    pub fn new(transaction_id: impl ToString) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenAccountRequest {
    pub name: String,
    pub currency: String,
}

impl OpenAccountRequest {
    pub fn new(name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            currency: currency.into(),
        }
    }
}

/// A validated [`CreateTransactionRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionCommand {
    pub amount: Amount,
    pub order: TransactionOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionOrder {
    Transfer { from: CardNumber, to: CardNumber },
    Deposit { card: CardNumber },
    Withdrawal { card: CardNumber },
}

impl TransactionOrder {
    /// The card whose account initiates the transaction.
    pub fn initiating_card(&self) -> &CardNumber {
        match self {
            Self::Transfer { from, .. } => from,
            Self::Deposit { card } | Self::Withdrawal { card } => card,
        }
    }
}

/// A validated [`OpenAccountRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAccountCommand {
    pub name: String,
    pub currency: Currency,
}
