//! Configuration Loader - File Loading and Validation
//!
//! Loads `config.toml`, validates every parameter, and fails fast with
//! actionable messages for misconfiguration. Decimal fields are TOML
//! strings (e.g. `fee_rate = "0.02"`).

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use super::EngineConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns a detailed error if the file can't be read, TOML parsing
/// fails, or a validation rule is violated.
pub fn load_config(path: &str) -> Result<EngineConfig> {
    let path = Path::new(path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: EngineConfig =
        toml::from_str(&content).context("Failed to parse config.toml")?;

    validate_config(&config)?;

    info!(
        drift_tolerance = %config.pool.drift_tolerance,
        max_fee_rate = %config.pool.max_fee_rate,
        max_retries = config.concurrency.max_retries,
        "Configuration loaded successfully"
    );

    Ok(config)
}

/// Validate all configuration parameters.
pub fn validate_config(config: &EngineConfig) -> Result<()> {
    anyhow::ensure!(
        config.trading.max_book_depth > 0,
        "trading.max_book_depth must be positive"
    );
    anyhow::ensure!(
        config.pool.max_fee_rate >= Decimal::ZERO && config.pool.max_fee_rate <= dec!(0.10),
        "pool.max_fee_rate must be within [0, 0.10], got {}",
        config.pool.max_fee_rate
    );
    anyhow::ensure!(
        config.pool.drift_tolerance > Decimal::ZERO && config.pool.drift_tolerance <= Decimal::ONE,
        "pool.drift_tolerance must be within (0, 1], got {}",
        config.pool.drift_tolerance
    );
    anyhow::ensure!(
        config.concurrency.max_retries >= 1,
        "concurrency.max_retries must be at least 1"
    );
    anyhow::ensure!(
        config.concurrency.lock_timeout_ms >= 100,
        "concurrency.lock_timeout_ms must be at least 100ms"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_fee_ceiling_out_of_range_rejected() {
        let mut config = EngineConfig::default();
        config.pool.max_fee_rate = dec!(0.50);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_fee_rate"));
    }

    #[test]
    fn test_zero_drift_tolerance_rejected() {
        let mut config = EngineConfig::default();
        config.pool.drift_tolerance = Decimal::ZERO;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("outcome_exchange_config_test.toml");
        std::fs::write(
            &path,
            r#"
            [trading]
            max_book_depth = 50

            [concurrency]
            max_retries = 5
            "#,
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.trading.max_book_depth, 50);
        assert_eq!(config.concurrency.max_retries, 5);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(load_config("/nonexistent/config.toml").is_err());
    }
}
