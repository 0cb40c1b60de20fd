use super::balance_writer::BalanceRow;
use super::operation_reader::{OperationKind, WalletOperation};
use crate::application::engine::WalletEngine;
use crate::domain::account::AccountId;
use crate::domain::card::CardNumber;
use crate::domain::request::{
    CallContext, CreateTransactionRequest, OpenAccountRequest, RollbackRequest,
};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::{Result, WalletError};
use crate::infrastructure::identity::StaticIdentityResolver;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Handle {
    account: AccountId,
    card: CardNumber,
}

/// Drives a [`WalletEngine`] from replay rows.
///
/// Accounts are addressed as `user/account` and resolved lazily against the
/// engine, so a replay over persistent storage picks up accounts opened by
/// an earlier run. Each account is operated through its first card.
pub struct Replay {
    engine: Arc<WalletEngine>,
    identities: Arc<StaticIdentityResolver>,
    handles: HashMap<(String, String), Handle>,
    references: HashMap<String, TransactionId>,
}

impl Replay {
    pub fn new(engine: Arc<WalletEngine>, identities: Arc<StaticIdentityResolver>) -> Self {
        Self {
            engine,
            identities,
            handles: HashMap::new(),
            references: HashMap::new(),
        }
    }

    /// Applies one row through the engine on behalf of `op.user`.
    pub async fn apply(&mut self, op: WalletOperation) -> Result<()> {
        self.identities.register(&op.user);
        let ctx = CallContext::new(&op.user);
        if let Some(reference) = &op.reference
            && op.op != OperationKind::Rollback
            && self.references.contains_key(reference)
        {
            return Err(WalletError::AlreadyExists(format!("reference `{reference}`")));
        }
        match op.op {
            OperationKind::Open => {
                if self.lookup(&op.user, &op.account).await?.is_some() {
                    return Err(WalletError::AlreadyExists(format!(
                        "account {}/{}",
                        op.user, op.account
                    )));
                }
                let currency = op
                    .currency
                    .clone()
                    .ok_or_else(|| WalletError::invalid("open requires a currency"))?;
                let account = self
                    .engine
                    .open_account(&ctx, OpenAccountRequest::new(op.account.clone(), currency))
                    .await?;
                let card = self.engine.issue_card(&ctx, account.id).await?;
                self.handles.insert(
                    (op.user, op.account),
                    Handle {
                        account: account.id,
                        card: card.number,
                    },
                );
            }
            OperationKind::Deposit => {
                let from = self.require(&op.user, &op.account).await?;
                let request = CreateTransactionRequest::deposit(required_amount(&op)?, &from.card);
                let tx = self.engine.create_transaction(&ctx, request).await?;
                self.remember(&op, &tx);
            }
            OperationKind::Withdrawal => {
                let from = self.require(&op.user, &op.account).await?;
                let request =
                    CreateTransactionRequest::withdrawal(required_amount(&op)?, &from.card);
                let tx = self.engine.create_transaction(&ctx, request).await?;
                self.remember(&op, &tx);
            }
            OperationKind::Transfer => {
                let from = self.require(&op.user, &op.account).await?;
                let counterparty = op
                    .counterparty
                    .as_deref()
                    .ok_or_else(|| WalletError::invalid("transfer requires a counterparty"))?;
                let (user, account) = split_address(counterparty)?;
                let to = self.require(user, account).await?;
                let request =
                    CreateTransactionRequest::transfer(required_amount(&op)?, &from.card, &to.card);
                let tx = self.engine.create_transaction(&ctx, request).await?;
                self.remember(&op, &tx);
            }
            OperationKind::Rollback => {
                let reference = op
                    .reference
                    .as_deref()
                    .ok_or_else(|| WalletError::invalid("rollback requires a reference"))?;
                let id = self
                    .references
                    .get(reference)
                    .copied()
                    .ok_or_else(|| WalletError::NotFound(format!("reference `{reference}`")))?;
                self.engine
                    .rollback_transfer(&ctx, RollbackRequest::new(id))
                    .await?;
            }
            OperationKind::Close => {
                let handle = self.require(&op.user, &op.account).await?;
                self.engine.close_account(&ctx, handle.account).await?;
                self.handles.remove(&(op.user, op.account));
            }
        }
        Ok(())
    }

    /// Balances of every account owned by a user the replay has seen.
    pub async fn balances(&self) -> Result<Vec<BalanceRow>> {
        let mut rows = Vec::new();
        for user in self.identities.identities() {
            for account in self.engine.list_accounts(&CallContext::new(&user)).await? {
                rows.push(BalanceRow {
                    user: user.clone(),
                    account: account.name,
                    currency: account.currency,
                    balance: account.balance.value(),
                });
            }
        }
        Ok(rows)
    }

    async fn require(&mut self, user: &str, account: &str) -> Result<Handle> {
        self.lookup(user, account)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("account {user}/{account}")))
    }

    async fn lookup(&mut self, user: &str, name: &str) -> Result<Option<Handle>> {
        let key = (user.to_string(), name.to_string());
        if let Some(handle) = self.handles.get(&key) {
            return Ok(Some(handle.clone()));
        }

        self.identities.register(user);
        let ctx = CallContext::new(user);
        let Some(account) = self
            .engine
            .list_accounts(&ctx)
            .await?
            .into_iter()
            .find(|account| account.name == name)
        else {
            return Ok(None);
        };
        let card = match self.engine.list_cards(&ctx, account.id).await?.into_iter().next() {
            Some(card) => card,
            None => self.engine.issue_card(&ctx, account.id).await?,
        };
        let handle = Handle {
            account: account.id,
            card: card.number,
        };
        self.handles.insert(key, handle.clone());
        Ok(Some(handle))
    }

    fn remember(&mut self, op: &WalletOperation, tx: &Transaction) {
        if let Some(reference) = &op.reference {
            self.references.insert(reference.clone(), tx.id);
        }
    }
}

fn required_amount(op: &WalletOperation) -> Result<Decimal> {
    op.amount
        .ok_or_else(|| WalletError::invalid(format!("{:?} requires an amount", op.op)))
}

fn split_address(address: &str) -> Result<(&str, &str)> {
    match address.split_once('/') {
        Some((user, account)) if !user.is_empty() && !account.is_empty() => Ok((user, account)),
        _ => Err(WalletError::invalid(format!(
            "malformed account address `{address}`, expected user/account"
        ))),
    }
}
