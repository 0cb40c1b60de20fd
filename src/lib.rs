//! Wallet transaction engine: moves money between accounts under per-account
//! locks, with every balance change committed atomically alongside its
//! transaction row.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

pub use application::engine::WalletEngine;
pub use config::EngineConfig;
pub use error::{ErrorKind, Result, WalletError};
