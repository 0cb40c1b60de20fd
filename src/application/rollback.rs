use super::engine::WalletEngine;
use crate::domain::request::{CallContext, RollbackRequest};
use crate::domain::transaction::Transaction;
use crate::error::Result;
use tracing::{info, instrument};

impl WalletEngine {
    /// Reverses a committed transfer initiated from one of the caller's
    /// accounts. Only transfers can be reversed, and only once.
    #[instrument(skip_all, fields(caller = %ctx.identity, transaction_id = %request.transaction_id))]
    pub async fn rollback_transfer(
        &self,
        ctx: &CallContext,
        request: RollbackRequest,
    ) -> Result<Transaction> {
        self.within_deadline(ctx, "rollback_transfer", self.execute_rollback(ctx, request))
            .await
    }

    async fn execute_rollback(&self, ctx: &CallContext, request: RollbackRequest) -> Result<Transaction> {
        let id = self.validator.validate_rollback(&request)?;
        let owner = self.identities.resolve(&ctx.identity).await?;
        let tx = self.transactions.get_transaction(id).await?;
        let (source, destination) = tx.ensure_reversible()?;
        self.accounts
            .get_account(source)
            .await?
            .ensure_owned_by(owner)?;

        // The flag is checked again inside the storage unit, so a rollback
        // racing this one for the same id fails there.
        let guard = self.locker.acquire([source, destination]).await;
        let reversed = self.transactions.rollback_transfer(id).await?;
        guard.release();

        info!(transaction_id = %reversed.id, amount = %reversed.amount, "transfer rolled back");
        Ok(reversed)
    }
}
