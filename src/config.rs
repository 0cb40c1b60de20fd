use crate::error::{Result, WalletError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Engine tuning knobs.
///
/// Durations are expressed in milliseconds so the struct can be loaded from a
/// plain JSON file; missing fields fall back to [`EngineConfig::default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for any engine operation unless the caller overrides it.
    pub operation_timeout_ms: u64,
    /// Smallest amount a transaction may move.
    pub min_amount: Decimal,
    /// Maximum number of decimal places accepted in an amount.
    pub max_amount_scale: u32,
    /// How often the lock table is swept for idle entries.
    pub lock_sweep_interval_ms: u64,
    /// How long an unheld lock entry survives before a sweep may drop it.
    pub lock_idle_ttl_ms: u64,
    /// Longest account display name accepted.
    pub max_account_name_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 5_000,
            min_amount: Decimal::new(1, 2),
            max_amount_scale: 2,
            lock_sweep_interval_ms: 30_000,
            lock_idle_ttl_ms: 60_000,
            max_account_name_len: 64,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| WalletError::invalid(format!("invalid engine config: {e}")))
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn lock_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.lock_sweep_interval_ms)
    }

    pub fn lock_idle_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_idle_ttl_ms)
    }
}
