//! Application layer: the wallet engine and the key locker it serializes
//! account access with.
//!
//! `WalletEngine` is split by concern. Money movement lives in
//! `transactions`, reversal in `rollback`, and account and card management
//! in `accounts`.

pub mod accounts;
pub mod engine;
pub mod locker;
pub mod rollback;
pub mod transactions;
