use super::engine::WalletEngine;
use crate::domain::account::{Account, AccountId, OwnerId};
use crate::domain::card::{Card, CardNumber};
use crate::domain::request::{CallContext, OpenAccountRequest};
use crate::domain::transaction::{Transaction, TransactionFilter};
use crate::error::Result;
use std::collections::HashSet;
use tracing::{info, instrument};

impl WalletEngine {
    /// Opens an empty account owned by the caller.
    #[instrument(skip_all, fields(caller = %ctx.identity))]
    pub async fn open_account(&self, ctx: &CallContext, request: OpenAccountRequest) -> Result<Account> {
        self.within_deadline(ctx, "open_account", async {
            let command = self.validator.validate_open_account(&request)?;
            let owner = self.identities.resolve(&ctx.identity).await?;
            let account = self
                .accounts
                .create_account(Account::open(owner, command.name, command.currency))
                .await?;
            info!(account_id = %account.id, currency = %account.currency, "account opened");
            Ok(account)
        })
        .await
    }

    /// Deletes a zero-balance account together with its cards.
    #[instrument(skip_all, fields(caller = %ctx.identity, account_id = %account_id))]
    pub async fn close_account(&self, ctx: &CallContext, account_id: AccountId) -> Result<Account> {
        self.within_deadline(ctx, "close_account", async {
            self.owned_account(ctx, account_id).await?;
            let guard = self.locker.acquire([account_id]).await;
            let closed = self.accounts.delete_account(account_id).await?;
            guard.release();
            info!(account_id = %account_id, "account closed");
            Ok(closed)
        })
        .await
    }

    /// Issues a new card for one of the caller's accounts.
    #[instrument(skip_all, fields(caller = %ctx.identity, account_id = %account_id))]
    pub async fn issue_card(&self, ctx: &CallContext, account_id: AccountId) -> Result<Card> {
        self.within_deadline(ctx, "issue_card", async {
            self.owned_account(ctx, account_id).await?;
            let card = self
                .cards
                .create_card(Card::new(self.card_numbers.generate(), account_id))
                .await?;
            info!(account_id = %account_id, card = %card.number.masked(), "card issued");
            Ok(card)
        })
        .await
    }

    /// Removes a card. The account it pointed at is left alone.
    #[instrument(skip_all, fields(caller = %ctx.identity))]
    pub async fn remove_card(&self, ctx: &CallContext, number: &str) -> Result<Card> {
        self.within_deadline(ctx, "remove_card", async {
            let number = CardNumber::parse(number)?;
            let card = self.cards.get_card(&number).await?;
            self.owned_account(ctx, card.account).await?;
            self.cards.delete_card(&number).await
        })
        .await
    }

    #[instrument(skip_all, fields(caller = %ctx.identity))]
    pub async fn list_accounts(&self, ctx: &CallContext) -> Result<Vec<Account>> {
        self.within_deadline(ctx, "list_accounts", async {
            let owner = self.identities.resolve(&ctx.identity).await?;
            self.accounts.list_accounts(owner).await
        })
        .await
    }

    #[instrument(skip_all, fields(caller = %ctx.identity, account_id = %account_id))]
    pub async fn get_account(&self, ctx: &CallContext, account_id: AccountId) -> Result<Account> {
        self.within_deadline(ctx, "get_account", self.owned_account(ctx, account_id))
            .await
    }

    #[instrument(skip_all, fields(caller = %ctx.identity, account_id = %account_id))]
    pub async fn list_cards(&self, ctx: &CallContext, account_id: AccountId) -> Result<Vec<Card>> {
        self.within_deadline(ctx, "list_cards", async {
            self.owned_account(ctx, account_id).await?;
            self.cards.list_cards(account_id).await
        })
        .await
    }

    /// Lists transactions touching the caller's accounts, newest first.
    ///
    /// A filter naming an account must name one the caller owns. Without an
    /// account, every account the caller currently owns is considered.
    #[instrument(skip_all, fields(caller = %ctx.identity))]
    pub async fn list_transactions(
        &self,
        ctx: &CallContext,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        self.within_deadline(ctx, "list_transactions", async {
            if let Some(account_id) = filter.account {
                self.owned_account(ctx, account_id).await?;
                return self.transactions.list_transactions(&filter).await;
            }

            let owner = self.identities.resolve(&ctx.identity).await?;
            let owned = self.owned_ids(owner).await?;
            let unbounded = TransactionFilter {
                limit: None,
                ..filter.clone()
            };
            let rows = self.transactions.list_transactions(&unbounded).await?;
            let page = TransactionFilter {
                limit: filter.limit,
                ..TransactionFilter::default()
            };
            Ok(page.apply(
                rows.iter()
                    .filter(|tx| tx.kind.accounts().iter().any(|id| owned.contains(id))),
            ))
        })
        .await
    }

    async fn owned_account(&self, ctx: &CallContext, account_id: AccountId) -> Result<Account> {
        let owner = self.identities.resolve(&ctx.identity).await?;
        let account = self.accounts.get_account(account_id).await?;
        account.ensure_owned_by(owner)?;
        Ok(account)
    }

    async fn owned_ids(&self, owner: OwnerId) -> Result<HashSet<AccountId>> {
        Ok(self
            .accounts
            .list_accounts(owner)
            .await?
            .into_iter()
            .map(|account| account.id)
            .collect())
    }
}
