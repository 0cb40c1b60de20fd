use super::locker::KeyLocker;
use crate::config::EngineConfig;
use crate::domain::account::AccountId;
use crate::domain::ports::{
    AccountRepository, AccountRepositoryRef, CardNumberGenerator, CardRepository,
    CardRepositoryRef, IdentityResolver, TransactionRepository, TransactionRepositoryRef,
    Validator,
};
use crate::domain::request::CallContext;
use crate::error::{Result, WalletError};
use crate::infrastructure::card_numbers::RandomCardNumbers;
use crate::infrastructure::validation::RuleValidator;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

/// The entry point for every wallet operation.
///
/// `WalletEngine` owns the storage ports and the collaborators it consults
/// before touching them. Mutations on an account only happen while that
/// account's key is held in the engine's [`KeyLocker`], and every public
/// operation is bounded by a deadline taken from the [`CallContext`] or,
/// failing that, from [`EngineConfig::operation_timeout`].
///
/// The operations themselves live next to their concern:
/// `transactions.rs`, `rollback.rs` and `accounts.rs`.
pub struct WalletEngine {
    pub(super) accounts: AccountRepositoryRef,
    pub(super) cards: CardRepositoryRef,
    pub(super) transactions: TransactionRepositoryRef,
    pub(super) identities: Arc<dyn IdentityResolver>,
    pub(super) validator: Arc<dyn Validator>,
    pub(super) card_numbers: Arc<dyn CardNumberGenerator>,
    pub(super) locker: KeyLocker<AccountId>,
    config: EngineConfig,
}

impl WalletEngine {
    /// Creates an engine over a single ledger that serves all three
    /// repository ports.
    ///
    /// # Arguments
    ///
    /// * `ledger` - Storage backend, e.g. `InMemoryLedger` or `RocksDBLedger`.
    /// * `identities` - Maps caller identities to owner ids.
    /// * `config` - Timeouts, amount limits and lock table tuning.
    pub fn new<L>(ledger: Arc<L>, identities: Arc<dyn IdentityResolver>, config: EngineConfig) -> Self
    where
        L: AccountRepository + CardRepository + TransactionRepository + 'static,
    {
        Self {
            accounts: ledger.clone(),
            cards: ledger.clone(),
            transactions: ledger,
            identities,
            validator: Arc::new(RuleValidator::from_config(&config)),
            card_numbers: Arc::new(RandomCardNumbers),
            locker: KeyLocker::new(config.lock_idle_ttl()),
            config,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_card_numbers(mut self, card_numbers: Arc<dyn CardNumberGenerator>) -> Self {
        self.card_numbers = card_numbers;
        self
    }

    /// Replaces only the transaction port, leaving accounts and cards on the
    /// original ledger.
    pub fn with_transaction_repository(mut self, transactions: TransactionRepositoryRef) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts the background task that evicts idle lock entries. It stops
    /// when the engine is dropped.
    pub fn start_lock_sweeper(&self) -> JoinHandle<()> {
        self.locker.spawn_sweeper(self.config.lock_sweep_interval())
    }

    /// Number of lock entries currently tracked.
    pub fn lock_entries(&self) -> usize {
        self.locker.len()
    }

    /// Drives `work` to completion or drops it once the caller's deadline
    /// passes. Dropping it abandons any lock wait or storage unit in flight.
    pub(super) async fn within_deadline<T, F>(
        &self,
        ctx: &CallContext,
        operation: &'static str,
        work: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = ctx.timeout.unwrap_or_else(|| self.config.operation_timeout());
        let result = match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(WalletError::DeadlineExceeded(limit)),
        };
        if let Err(e) = &result {
            warn!(operation, caller = %ctx.identity, kind = ?e.kind(), error = %e, "operation failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::infrastructure::identity::StaticIdentityResolver;
    use crate::infrastructure::in_memory::InMemoryLedger;
    use std::time::Duration;

    fn engine() -> WalletEngine {
        WalletEngine::new(
            Arc::new(InMemoryLedger::new()),
            Arc::new(StaticIdentityResolver::new()),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_deadline_cancels_pending_work() {
        let engine = engine();
        let ctx = CallContext::new("alice").with_timeout(Duration::from_millis(10));
        let err = engine
            .within_deadline(&ctx, "test", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_deadline_passes_results_through() {
        let engine = engine();
        let ctx = CallContext::new("alice");
        let value = engine
            .within_deadline(&ctx, "test", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = engine
            .within_deadline::<(), _>(&ctx, "test", async {
                Err(WalletError::NotFound("thing".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
