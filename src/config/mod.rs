//! Configuration Module - TOML-based Engine Configuration
//!
//! All tunable parameters of the trading core live here: pool drift
//! tolerance, retry budget, lock timeout, book depth. Nothing is
//! hard-coded in the domain layer. The fee rate itself is per-market
//! state on the `LiquidityPool` row (observed range 0–3% across
//! deployments); the engine only enforces the ceiling configured here.

pub mod loader;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// Top-level engine configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Matching and fee parameters.
    #[serde(default)]
    pub trading: TradingConfig,
    /// Pool invariant parameters.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Per-market lock and retry parameters.
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            pool: PoolConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

/// Matching parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Maximum resting orders fetched per matching walk.
    #[serde(default = "default_book_depth")]
    pub max_book_depth: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            max_book_depth: default_book_depth(),
        }
    }
}

/// Pool invariant parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Maximum tolerated |k − reserve| / reserve deviation before the
    /// outcome refuses trades pending an explicit rebalance.
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance: Decimal,
    /// Ceiling for a pool row's fee rate; a pool configured above this
    /// refuses trades as malformed.
    #[serde(default = "default_max_fee_rate")]
    pub max_fee_rate: Decimal,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            drift_tolerance: default_drift_tolerance(),
            max_fee_rate: default_max_fee_rate(),
        }
    }
}

/// Per-market lock and retry parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencyConfig {
    /// Internal retries on optimistic conflicts before surfacing `Busy`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Bounded wait for the per-market lock (milliseconds).
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            lock_timeout_ms: default_lock_timeout(),
        }
    }
}

// Default value functions for serde

fn default_book_depth() -> usize {
    100
}

fn default_drift_tolerance() -> Decimal {
    dec!(0.10)
}

fn default_max_fee_rate() -> Decimal {
    dec!(0.03)
}

fn default_max_retries() -> u32 {
    3
}

fn default_lock_timeout() -> u64 {
    2_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.trading.max_book_depth, 100);
        assert_eq!(config.pool.drift_tolerance, dec!(0.10));
        assert_eq!(config.pool.max_fee_rate, dec!(0.03));
        assert_eq!(config.concurrency.max_retries, 3);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [pool]
            drift_tolerance = "0.05"
            "#,
        )
        .unwrap();
        assert_eq!(config.pool.drift_tolerance, dec!(0.05));
        assert_eq!(config.trading.max_book_depth, 100);
        assert_eq!(config.concurrency.lock_timeout_ms, 2_000);
    }
}
