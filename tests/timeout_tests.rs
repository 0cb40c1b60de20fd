mod common;

use async_trait::async_trait;
use common::Harness;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use wallet_ledger::domain::ports::TransactionRepository;
use wallet_ledger::domain::request::CreateTransactionRequest;
use wallet_ledger::domain::transaction::{Transaction, TransactionFilter, TransactionId};
use wallet_ledger::infrastructure::in_memory::InMemoryLedger;
use wallet_ledger::{ErrorKind, Result};

/// Delays every write by a fixed amount before handing it to the ledger.
struct SlowTransactions {
    inner: Arc<InMemoryLedger>,
    delay: Duration,
}

#[async_trait]
impl TransactionRepository for SlowTransactions {
    async fn record(&self, tx: Transaction) -> Result<Transaction> {
        tokio::time::sleep(self.delay).await;
        self.inner.record(tx).await
    }

    async fn rollback_transfer(&self, id: TransactionId) -> Result<Transaction> {
        tokio::time::sleep(self.delay).await;
        self.inner.rollback_transfer(id).await
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.inner.get_transaction(id).await
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        self.inner.list_transactions(filter).await
    }
}

fn slow_harness(delay: Duration) -> Harness {
    let h = Harness::new();
    let slow = Arc::new(SlowTransactions {
        inner: Arc::clone(&h.ledger),
        delay,
    });
    h.rebuild(|engine| engine.with_transaction_repository(slow))
}

#[tokio::test]
async fn test_deadline_during_storage_leaves_balances_untouched() {
    let h = slow_harness(Duration::from_millis(300));
    let alice = h.caller("alice");
    let bob = h.caller("bob");
    let a = h.wallet(&alice, "USD", dec!(100)).await;
    let b = h.wallet(&bob, "USD", dec!(0)).await;

    let hurried = alice.clone().with_timeout(Duration::from_millis(50));
    let err = h
        .engine
        .create_transaction(&hurried, CreateTransactionRequest::transfer(dec!(30), &a.card, &b.card))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);

    // Nothing completes after the caller gave up.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.balance(&alice, &a).await, dec!(100));
    assert_eq!(h.balance(&bob, &b).await, dec!(0));
    let transfers = h
        .engine
        .list_transactions(&alice, TransactionFilter::for_account(a.account))
        .await
        .unwrap();
    assert_eq!(transfers.len(), 1, "only the initial deposit is recorded");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deadline_while_waiting_for_a_lock() {
    let h = slow_harness(Duration::from_millis(300));
    let alice = h.caller("alice");
    let a = h.wallet(&alice, "USD", dec!(100)).await;

    // Holds the account key for the whole slow write.
    let first = {
        let engine = h.engine.clone();
        let ctx = alice.clone();
        let card = a.card.clone();
        tokio::spawn(async move {
            engine
                .create_transaction(&ctx, CreateTransactionRequest::withdrawal(dec!(10), &card))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let hurried = alice.clone().with_timeout(Duration::from_millis(100));
    let err = h
        .engine
        .create_transaction(&hurried, CreateTransactionRequest::withdrawal(dec!(20), &a.card))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);

    first.await.unwrap().unwrap();
    assert_eq!(h.balance(&alice, &a).await, dec!(90));
}
