//! Storage-level transactions shared by the ledger backends.
//!
//! A [`UnitOfWork`] stages every write in a [`ChangeSet`] on top of the
//! backend's committed state. Reads inside the unit see their own staged
//! writes; nothing becomes visible to anyone else until [`UnitOfWork::commit`]
//! hands the whole change set to the backend in one atomic write. Dropping an
//! unfinished unit discards the staged writes.

use crate::domain::account::{Account, AccountId, Amount};
use crate::domain::card::{Card, CardNumber};
use crate::domain::transaction::{Transaction, TransactionId, TransactionKind};
use crate::error::{Result, WalletError};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Writes staged by one unit of work. `None` marks a deletion.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub accounts: BTreeMap<AccountId, Option<Account>>,
    pub cards: BTreeMap<CardNumber, Option<Card>>,
    pub transactions: BTreeMap<TransactionId, Transaction>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.cards.is_empty() && self.transactions.is_empty()
    }
}

/// Committed rows as seen by a backend holding its writer slot.
pub trait CommittedState {
    fn account(&self, id: AccountId) -> Result<Option<Account>>;
    fn card(&self, number: &CardNumber) -> Result<Option<Card>>;
    fn cards_of(&self, account: AccountId) -> Result<Vec<Card>>;
    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Writes every change or none of them.
    fn apply(&mut self, changes: ChangeSet) -> Result<()>;

    /// Releases anything the backend reserved for this unit.
    fn discard(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct UnitOfWork<S: CommittedState> {
    state: S,
    changes: ChangeSet,
    finished: bool,
}

impl<S: CommittedState> UnitOfWork<S> {
    pub fn begin(state: S) -> Self {
        Self {
            state,
            changes: ChangeSet::default(),
            finished: false,
        }
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        let changes = std::mem::take(&mut self.changes);
        if changes.is_empty() {
            return Ok(());
        }
        self.state
            .apply(changes)
            .map_err(|e| WalletError::CommitFailed(Box::new(e)))
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.changes = ChangeSet::default();
        self.state.discard()
    }

    // Row access through the staged overlay.

    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        match self.changes.accounts.get(&id) {
            Some(staged) => Ok(staged.clone()),
            None => self.state.account(id),
        }
    }

    pub fn require_account(&self, id: AccountId) -> Result<Account> {
        self.account(id)?
            .ok_or_else(|| WalletError::NotFound(format!("account {id}")))
    }

    fn card(&self, number: &CardNumber) -> Result<Option<Card>> {
        match self.changes.cards.get(number) {
            Some(staged) => Ok(staged.clone()),
            None => self.state.card(number),
        }
    }

    fn cards_of(&self, account: AccountId) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = self
            .state
            .cards_of(account)?
            .into_iter()
            .filter(|card| !self.changes.cards.contains_key(&card.number))
            .collect();
        cards.extend(
            self.changes
                .cards
                .values()
                .flatten()
                .filter(|card| card.account == account)
                .cloned(),
        );
        Ok(cards)
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        match self.changes.transactions.get(&id) {
            Some(staged) => Ok(Some(staged.clone())),
            None => self.state.transaction(id),
        }
    }

    // Statements.

    pub fn insert_account(&mut self, account: Account) -> Result<()> {
        if self.account(account.id)?.is_some() {
            return Err(WalletError::AlreadyExists(format!("account {}", account.id)));
        }
        self.changes.accounts.insert(account.id, Some(account));
        Ok(())
    }

    /// Deletes a zero-balance account and every card pointing at it.
    pub fn delete_account(&mut self, id: AccountId) -> Result<Account> {
        let account = self.require_account(id)?;
        if !account.balance.is_zero() {
            return Err(WalletError::invalid(format!(
                "account {id} still holds {} {}",
                account.balance, account.currency
            )));
        }
        for card in self.cards_of(id)? {
            self.changes.cards.insert(card.number, None);
        }
        self.changes.accounts.insert(id, None);
        Ok(account)
    }

    pub fn add_balance(&mut self, id: AccountId, amount: Amount) -> Result<Account> {
        let mut account = self.require_account(id)?;
        account.deposit(amount)?;
        self.changes.accounts.insert(id, Some(account.clone()));
        Ok(account)
    }

    /// Fails with `InsufficientFunds` rather than drive the balance negative.
    pub fn subtract_balance(&mut self, id: AccountId, amount: Amount) -> Result<Account> {
        let mut account = self.require_account(id)?;
        account.withdraw(amount)?;
        self.changes.accounts.insert(id, Some(account.clone()));
        Ok(account)
    }

    pub fn insert_card(&mut self, card: Card) -> Result<()> {
        self.require_account(card.account)?;
        if self.card(&card.number)?.is_some() {
            return Err(WalletError::AlreadyExists(format!(
                "card {}",
                card.number.masked()
            )));
        }
        self.changes.cards.insert(card.number.clone(), Some(card));
        Ok(())
    }

    pub fn delete_card(&mut self, number: &CardNumber) -> Result<Card> {
        let card = self
            .card(number)?
            .ok_or_else(|| WalletError::NotFound(format!("card {}", number.masked())))?;
        self.changes.cards.insert(number.clone(), None);
        Ok(card)
    }

    pub fn insert_transaction(&mut self, tx: Transaction) -> Result<()> {
        if self.transaction(tx.id)?.is_some() {
            return Err(WalletError::AlreadyExists(format!("transaction {}", tx.id)));
        }
        self.changes.transactions.insert(tx.id, tx);
        Ok(())
    }

    /// Flips the rolled-back flag, refusing non-transfers and repeats.
    pub fn mark_rolled_back(&mut self, id: TransactionId) -> Result<Transaction> {
        let mut tx = self
            .transaction(id)?
            .ok_or_else(|| WalletError::NotFound(format!("transaction {id}")))?;
        tx.mark_rolled_back()?;
        self.changes.transactions.insert(id, tx.clone());
        Ok(tx)
    }

    /// Applies the balance effects of `tx` and inserts its row.
    pub fn record(&mut self, tx: Transaction) -> Result<Transaction> {
        match tx.kind {
            TransactionKind::Transfer {
                source,
                destination,
            } => {
                if source == destination {
                    return Err(WalletError::SelfTransfer);
                }
                let from = self.require_account(source)?;
                let to = self.require_account(destination)?;
                if from.currency != to.currency {
                    return Err(WalletError::CurrencyMismatch {
                        from: from.currency,
                        to: to.currency,
                    });
                }
                self.add_balance(destination, tx.amount)?;
                self.subtract_balance(source, tx.amount)?;
            }
            TransactionKind::Deposit { destination } => {
                self.add_balance(destination, tx.amount)?;
            }
            TransactionKind::Withdrawal { source } => {
                self.subtract_balance(source, tx.amount)?;
            }
        }
        self.insert_transaction(tx.clone())?;
        Ok(tx)
    }

    /// Marks a transfer rolled back and moves its amount back to the source.
    pub fn reverse_transfer(&mut self, id: TransactionId) -> Result<Transaction> {
        let tx = self.mark_rolled_back(id)?;
        let (source, destination) = match tx.kind {
            TransactionKind::Transfer {
                source,
                destination,
            } => (source, destination),
            TransactionKind::Deposit { .. } | TransactionKind::Withdrawal { .. } => {
                return Err(WalletError::NotReversible(id));
            }
        };
        self.add_balance(source, tx.amount)?;
        self.subtract_balance(destination, tx.amount)?;
        Ok(tx)
    }
}

impl<S: CommittedState> Drop for UnitOfWork<S> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("unit of work dropped before completion; staged writes discarded");
        }
    }
}

/// Runs `body` in a fresh unit of work: commit if it returns `Ok`, roll back
/// otherwise.
pub fn atomically<S, T, F>(state: S, body: F) -> Result<T>
where
    S: CommittedState,
    F: FnOnce(&mut UnitOfWork<S>) -> Result<T>,
{
    let mut unit = UnitOfWork::begin(state);
    match body(&mut unit) {
        Ok(value) => {
            unit.commit()?;
            Ok(value)
        }
        Err(cause) => match unit.rollback() {
            Ok(()) => Err(cause),
            Err(failure) => {
                warn!(%cause, %failure, "rollback failed");
                Err(WalletError::RollbackFailed {
                    cause: Box::new(cause),
                    failure: Box::new(failure),
                })
            }
        },
    }
}
