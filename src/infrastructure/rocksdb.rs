use super::unit_of_work::{ChangeSet, CommittedState, UnitOfWork, atomically};
use crate::domain::account::{Account, AccountId, OwnerId};
use crate::domain::card::{Card, CardNumber};
use crate::domain::ports::{AccountRepository, CardRepository, TransactionRepository};
use crate::domain::transaction::{Transaction, TransactionFilter, TransactionId};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// Column Family for account rows, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for card rows, keyed by card number.
pub const CF_CARDS: &str = "cards";
/// Column Family for transaction rows, keyed by transaction id.
pub const CF_TRANSACTIONS: &str = "transactions";

fn column<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        WalletError::Storage(Box::new(std::io::Error::other(format!(
            "{name} column family not found"
        ))))
    })
}

fn get_row<T: DeserializeOwned>(db: &DB, cf: &str, key: &[u8]) -> Result<Option<T>> {
    match db.get_cf(column(db, cf)?, key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn scan<T: DeserializeOwned>(db: &DB, cf: &str) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    for item in db.iterator_cf(column(db, cf)?, IteratorMode::Start) {
        let (_key, value) = item?;
        rows.push(serde_json::from_slice(&value)?);
    }
    Ok(rows)
}

fn put<T: Serialize>(batch: &mut WriteBatch, cf: &ColumnFamily, key: &[u8], row: &T) -> Result<()> {
    batch.put_cf(cf, key, serde_json::to_vec(row)?);
    Ok(())
}

/// Committed rows plus the store's single writer slot, held for one unit of work.
struct WriterSlot {
    db: Arc<DB>,
    _writer: OwnedMutexGuard<()>,
}

impl CommittedState for WriterSlot {
    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        get_row(&self.db, CF_ACCOUNTS, id.as_uuid().as_bytes())
    }

    fn card(&self, number: &CardNumber) -> Result<Option<Card>> {
        get_row(&self.db, CF_CARDS, number.as_str().as_bytes())
    }

    fn cards_of(&self, account: AccountId) -> Result<Vec<Card>> {
        let cards: Vec<Card> = scan(&self.db, CF_CARDS)?;
        Ok(cards.into_iter().filter(|c| c.account == account).collect())
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        get_row(&self.db, CF_TRANSACTIONS, id.as_uuid().as_bytes())
    }

    fn apply(&mut self, changes: ChangeSet) -> Result<()> {
        let accounts = column(&self.db, CF_ACCOUNTS)?;
        let cards = column(&self.db, CF_CARDS)?;
        let transactions = column(&self.db, CF_TRANSACTIONS)?;

        let mut batch = WriteBatch::default();
        for (id, row) in &changes.accounts {
            let key = id.as_uuid().as_bytes();
            match row {
                Some(account) => put(&mut batch, accounts, key, account)?,
                None => batch.delete_cf(accounts, key),
            }
        }
        for (number, row) in &changes.cards {
            let key = number.as_str().as_bytes();
            match row {
                Some(card) => put(&mut batch, cards, key, card)?,
                None => batch.delete_cf(cards, key),
            }
        }
        for (id, tx) in &changes.transactions {
            put(&mut batch, transactions, id.as_uuid().as_bytes(), tx)?;
        }
        self.db.write(batch)?;
        Ok(())
    }
}

/// A persistent ledger implementation using RocksDB.
///
/// Accounts, cards and transactions live in separate Column Families. A unit
/// of work stages its writes and commits them as a single `WriteBatch`, so a
/// balance change and its transaction row land together or not at all.
/// Units are serialized through one writer slot; plain reads go straight to
/// the database and only see committed batches.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBLedger {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDBLedger {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// the column families on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ACCOUNTS, CF_CARDS, CF_TRANSACTIONS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path.as_ref(), descriptors)?;
        info!(path = %path.as_ref().display(), "opened RocksDB ledger");

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    async fn atomically<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut UnitOfWork<WriterSlot>) -> Result<T>,
    {
        let slot = WriterSlot {
            db: Arc::clone(&self.db),
            _writer: Arc::clone(&self.writer).lock_owned().await,
        };
        atomically(slot, body)
    }

    /// Every account in the ledger, sorted by creation time.
    pub async fn all_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = scan(&self.db, CF_ACCOUNTS)?;
        accounts.sort_by_key(|account| account.created_at);
        Ok(accounts)
    }
}

#[async_trait]
impl AccountRepository for RocksDBLedger {
    async fn create_account(&self, account: Account) -> Result<Account> {
        self.atomically(|unit| {
            unit.insert_account(account.clone())?;
            Ok(account)
        })
        .await
    }

    async fn get_account(&self, id: AccountId) -> Result<Account> {
        get_row(&self.db, CF_ACCOUNTS, id.as_uuid().as_bytes())?
            .ok_or_else(|| WalletError::NotFound(format!("account {id}")))
    }

    async fn get_account_by_card(&self, number: &CardNumber) -> Result<Account> {
        let card: Option<Card> = get_row(&self.db, CF_CARDS, number.as_str().as_bytes())?;
        let account = match card {
            Some(card) => get_row(&self.db, CF_ACCOUNTS, card.account.as_uuid().as_bytes())?,
            None => None,
        };
        account.ok_or_else(|| {
            WalletError::NotFound(format!("account for card {}", number.masked()))
        })
    }

    async fn list_accounts(&self, owner: OwnerId) -> Result<Vec<Account>> {
        Ok(self
            .all_accounts()
            .await?
            .into_iter()
            .filter(|account| account.owner == owner)
            .collect())
    }

    async fn delete_account(&self, id: AccountId) -> Result<Account> {
        self.atomically(|unit| unit.delete_account(id)).await
    }
}

#[async_trait]
impl CardRepository for RocksDBLedger {
    async fn create_card(&self, card: Card) -> Result<Card> {
        self.atomically(|unit| {
            unit.insert_card(card.clone())?;
            Ok(card)
        })
        .await
    }

    async fn get_card(&self, number: &CardNumber) -> Result<Card> {
        get_row(&self.db, CF_CARDS, number.as_str().as_bytes())?
            .ok_or_else(|| WalletError::NotFound(format!("card {}", number.masked())))
    }

    async fn list_cards(&self, account: AccountId) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = scan(&self.db, CF_CARDS)?;
        cards.retain(|card| card.account == account);
        cards.sort_by_key(|card| card.created_at);
        Ok(cards)
    }

    async fn delete_card(&self, number: &CardNumber) -> Result<Card> {
        self.atomically(|unit| unit.delete_card(number)).await
    }
}

#[async_trait]
impl TransactionRepository for RocksDBLedger {
    async fn record(&self, tx: Transaction) -> Result<Transaction> {
        self.atomically(|unit| unit.record(tx)).await
    }

    async fn rollback_transfer(&self, id: TransactionId) -> Result<Transaction> {
        self.atomically(|unit| unit.reverse_transfer(id)).await
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        get_row(&self.db, CF_TRANSACTIONS, id.as_uuid().as_bytes())?
            .ok_or_else(|| WalletError::NotFound(format!("transaction {id}")))
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let rows: Vec<Transaction> = scan(&self.db, CF_TRANSACTIONS)?;
        Ok(filter.apply(&rows))
    }
}
