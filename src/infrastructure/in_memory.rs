use super::unit_of_work::{ChangeSet, CommittedState, UnitOfWork, atomically};
use crate::domain::account::{Account, AccountId, OwnerId};
use crate::domain::card::{Card, CardNumber};
use crate::domain::ports::{AccountRepository, CardRepository, TransactionRepository};
use crate::domain::transaction::{Transaction, TransactionFilter, TransactionId};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    cards: HashMap<CardNumber, Card>,
    transactions: HashMap<TransactionId, Transaction>,
}

/// Committed tables, held exclusively for the lifetime of one unit of work.
struct WriterSlot(OwnedRwLockWriteGuard<Tables>);

impl CommittedState for WriterSlot {
    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.0.accounts.get(&id).cloned())
    }

    fn card(&self, number: &CardNumber) -> Result<Option<Card>> {
        Ok(self.0.cards.get(number).cloned())
    }

    fn cards_of(&self, account: AccountId) -> Result<Vec<Card>> {
        Ok(self
            .0
            .cards
            .values()
            .filter(|card| card.account == account)
            .cloned()
            .collect())
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.0.transactions.get(&id).cloned())
    }

    fn apply(&mut self, changes: ChangeSet) -> Result<()> {
        let tables = &mut *self.0;
        for (id, row) in changes.accounts {
            match row {
                Some(account) => tables.accounts.insert(id, account),
                None => tables.accounts.remove(&id),
            };
        }
        for (number, row) in changes.cards {
            match row {
                Some(card) => tables.cards.insert(number, card),
                None => tables.cards.remove(&number),
            };
        }
        tables.transactions.extend(changes.transactions);
        Ok(())
    }
}

/// A thread-safe in-memory ledger implementing every repository port.
///
/// Reads take the shared lock and only ever see committed rows. Each
/// mutation runs as a unit of work that holds the exclusive lock while its
/// statements execute against a private overlay, then publishes the overlay
/// in one step. `Clone` shares the underlying tables.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    async fn atomically<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut UnitOfWork<WriterSlot>) -> Result<T>,
    {
        let slot = WriterSlot(Arc::clone(&self.tables).write_owned().await);
        atomically(slot, body)
    }
}

#[async_trait]
impl AccountRepository for InMemoryLedger {
    async fn create_account(&self, account: Account) -> Result<Account> {
        self.atomically(|unit| {
            unit.insert_account(account.clone())?;
            Ok(account)
        })
        .await
    }

    async fn get_account(&self, id: AccountId) -> Result<Account> {
        let tables = self.tables.read().await;
        tables
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("account {id}")))
    }

    async fn get_account_by_card(&self, number: &CardNumber) -> Result<Account> {
        let tables = self.tables.read().await;
        tables
            .cards
            .get(number)
            .and_then(|card| tables.accounts.get(&card.account))
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("account for card {}", number.masked())))
    }

    async fn list_accounts(&self, owner: OwnerId) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<Account> = tables
            .accounts
            .values()
            .filter(|account| account.owner == owner)
            .cloned()
            .collect();
        accounts.sort_by_key(|account| account.created_at);
        Ok(accounts)
    }

    async fn delete_account(&self, id: AccountId) -> Result<Account> {
        self.atomically(|unit| unit.delete_account(id)).await
    }
}

#[async_trait]
impl CardRepository for InMemoryLedger {
    async fn create_card(&self, card: Card) -> Result<Card> {
        self.atomically(|unit| {
            unit.insert_card(card.clone())?;
            Ok(card)
        })
        .await
    }

    async fn get_card(&self, number: &CardNumber) -> Result<Card> {
        let tables = self.tables.read().await;
        tables
            .cards
            .get(number)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("card {}", number.masked())))
    }

    async fn list_cards(&self, account: AccountId) -> Result<Vec<Card>> {
        let tables = self.tables.read().await;
        let mut cards: Vec<Card> = tables
            .cards
            .values()
            .filter(|card| card.account == account)
            .cloned()
            .collect();
        cards.sort_by_key(|card| card.created_at);
        Ok(cards)
    }

    async fn delete_card(&self, number: &CardNumber) -> Result<Card> {
        self.atomically(|unit| unit.delete_card(number)).await
    }
}

#[async_trait]
impl TransactionRepository for InMemoryLedger {
    async fn record(&self, tx: Transaction) -> Result<Transaction> {
        self.atomically(|unit| unit.record(tx)).await
    }

    async fn rollback_transfer(&self, id: TransactionId) -> Result<Transaction> {
        self.atomically(|unit| unit.reverse_transfer(id)).await
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        let tables = self.tables.read().await;
        tables
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("transaction {id}")))
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        Ok(filter.apply(tables.transactions.values()))
    }
}
