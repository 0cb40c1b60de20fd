#![allow(dead_code)]

use rust_decimal::Decimal;
use std::sync::Arc;
use wallet_ledger::domain::account::AccountId;
use wallet_ledger::domain::card::CardNumber;
use wallet_ledger::domain::request::{CallContext, CreateTransactionRequest, OpenAccountRequest};
use wallet_ledger::infrastructure::identity::StaticIdentityResolver;
use wallet_ledger::infrastructure::in_memory::InMemoryLedger;
use wallet_ledger::{EngineConfig, WalletEngine};

/// An account opened through the engine together with the card it is
/// operated by.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub account: AccountId,
    pub card: CardNumber,
}

pub struct Harness {
    pub engine: Arc<WalletEngine>,
    pub ledger: Arc<InMemoryLedger>,
    pub identities: Arc<StaticIdentityResolver>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let identities = Arc::new(StaticIdentityResolver::new());
        let engine = WalletEngine::new(Arc::clone(&ledger), identities.clone(), config);
        Self {
            engine: Arc::new(engine),
            ledger,
            identities,
        }
    }

    /// Builds the engine with `customize` applied, sharing this harness's
    /// ledger and identities.
    pub fn rebuild(self, customize: impl FnOnce(WalletEngine) -> WalletEngine) -> Self {
        let engine = WalletEngine::new(
            Arc::clone(&self.ledger),
            self.identities.clone(),
            self.engine.config().clone(),
        );
        Self {
            engine: Arc::new(customize(engine)),
            ..self
        }
    }

    /// Registers `name` and returns a context calling as them.
    pub fn caller(&self, name: &str) -> CallContext {
        self.identities.register(name);
        CallContext::new(name)
    }

    /// Opens an account with one card and deposits `balance` into it.
    pub async fn wallet(&self, ctx: &CallContext, currency: &str, balance: Decimal) -> Wallet {
        let account = self
            .engine
            .open_account(ctx, OpenAccountRequest::new("main", currency))
            .await
            .expect("open account");
        let card = self
            .engine
            .issue_card(ctx, account.id)
            .await
            .expect("issue card")
            .number;
        if balance > Decimal::ZERO {
            self.engine
                .create_transaction(ctx, CreateTransactionRequest::deposit(balance, &card))
                .await
                .expect("initial deposit");
        }
        Wallet {
            account: account.id,
            card,
        }
    }

    pub async fn balance(&self, ctx: &CallContext, wallet: &Wallet) -> Decimal {
        self.engine
            .get_account(ctx, wallet.account)
            .await
            .expect("get account")
            .balance
            .value()
    }
}
