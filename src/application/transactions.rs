use super::engine::WalletEngine;
use crate::domain::account::Amount;
use crate::domain::request::{CallContext, CreateTransactionRequest, TransactionOrder};
use crate::domain::transaction::{Transaction, TransactionKind};
use crate::error::{Result, WalletError};
use tracing::{info, instrument};

impl WalletEngine {
    /// Moves money on behalf of the caller.
    ///
    /// The request is validated and authorized against the account behind
    /// `from_card`. Balance checks run once optimistically and again after
    /// the involved account keys are held, so the committed row always
    /// reflects the balances it was checked against.
    #[instrument(
        skip_all,
        fields(caller = %ctx.identity, transaction_type = %request.transaction_type)
    )]
    pub async fn create_transaction(
        &self,
        ctx: &CallContext,
        request: CreateTransactionRequest,
    ) -> Result<Transaction> {
        self.within_deadline(ctx, "create_transaction", self.execute_transaction(ctx, request))
            .await
    }

    async fn execute_transaction(
        &self,
        ctx: &CallContext,
        request: CreateTransactionRequest,
    ) -> Result<Transaction> {
        let command = self.validator.validate_transaction(&request)?;
        let owner = self.identities.resolve(&ctx.identity).await?;
        let account = self
            .accounts
            .get_account_by_card(command.order.initiating_card())
            .await?;
        account.ensure_owned_by(owner)?;

        let amount = command.amount;
        let kind = match &command.order {
            TransactionOrder::Transfer { to, .. } => {
                account.ensure_covers(amount)?;
                let destination = self.accounts.get_account_by_card(to).await?;
                if destination.currency != account.currency {
                    return Err(WalletError::CurrencyMismatch {
                        from: account.currency,
                        to: destination.currency,
                    });
                }
                if destination.id == account.id {
                    return Err(WalletError::SelfTransfer);
                }
                TransactionKind::Transfer {
                    source: account.id,
                    destination: destination.id,
                }
            }
            TransactionOrder::Deposit { .. } => TransactionKind::Deposit {
                destination: account.id,
            },
            TransactionOrder::Withdrawal { .. } => {
                account.ensure_covers(amount)?;
                TransactionKind::Withdrawal { source: account.id }
            }
        };

        let guard = self.locker.acquire(kind.accounts()).await;
        self.recheck_under_lock(&kind, amount).await?;
        let tx = self.transactions.record(Transaction::new(amount, kind)).await?;
        guard.release();

        info!(
            transaction_id = %tx.id,
            transaction_type = %tx.transaction_type(),
            amount = %tx.amount,
            "transaction committed"
        );
        Ok(tx)
    }

    /// Re-reads every involved account now that nobody else can move money
    /// on them, and re-checks the source still covers `amount`.
    async fn recheck_under_lock(&self, kind: &TransactionKind, amount: Amount) -> Result<()> {
        for id in kind.accounts() {
            let current = self.accounts.get_account(id).await?;
            if kind.source() == Some(id) {
                current.ensure_covers(amount)?;
            }
        }
        Ok(())
    }
}
