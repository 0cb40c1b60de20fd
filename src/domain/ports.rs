use super::account::{Account, AccountId, OwnerId};
use super::card::{Card, CardNumber};
use super::request::{
    CreateTransactionRequest, OpenAccountCommand, OpenAccountRequest, RollbackRequest,
    TransactionCommand,
};
use super::transaction::{Transaction, TransactionFilter, TransactionId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Account storage.
///
/// Every mutating method runs as one storage-level unit of work: either all
/// of its statements become visible or none do.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the id is taken.
    async fn create_account(&self, account: Account) -> Result<Account>;
    async fn get_account(&self, id: AccountId) -> Result<Account>;
    async fn get_account_by_card(&self, number: &CardNumber) -> Result<Account>;
    async fn list_accounts(&self, owner: OwnerId) -> Result<Vec<Account>>;
    /// Removes a zero-balance account together with its cards.
    async fn delete_account(&self, id: AccountId) -> Result<Account>;
}

#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Fails with `AlreadyExists` on a duplicate number and `NotFound` when
    /// the account is missing.
    async fn create_card(&self, card: Card) -> Result<Card>;
    async fn get_card(&self, number: &CardNumber) -> Result<Card>;
    async fn list_cards(&self, account: AccountId) -> Result<Vec<Card>>;
    async fn delete_card(&self, number: &CardNumber) -> Result<Card>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Applies the balance effects of `tx` and inserts its row atomically.
    async fn record(&self, tx: Transaction) -> Result<Transaction>;
    /// Flips `rolled_back` and reverses both balance effects atomically.
    async fn rollback_transfer(&self, id: TransactionId) -> Result<Transaction>;
    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction>;
    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;
}

/// Maps an external caller identity onto the internal account owner.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, identity: &str) -> Result<OwnerId>;
}

/// Structural validation of request records.
pub trait Validator: Send + Sync {
    fn validate_transaction(&self, request: &CreateTransactionRequest)
    -> Result<TransactionCommand>;
    fn validate_rollback(&self, request: &RollbackRequest) -> Result<TransactionId>;
    fn validate_open_account(&self, request: &OpenAccountRequest) -> Result<OpenAccountCommand>;
}

/// Produces candidate card numbers. Collisions surface from storage.
pub trait CardNumberGenerator: Send + Sync {
    fn generate(&self) -> CardNumber;
}

pub type AccountRepositoryRef = Arc<dyn AccountRepository>;
pub type CardRepositoryRef = Arc<dyn CardRepository>;
pub type TransactionRepositoryRef = Arc<dyn TransactionRepository>;
