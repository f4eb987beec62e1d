//! Error taxonomy for the trading core.
//!
//! Every money-moving error leaves the ledger exactly as it was before
//! the call. Variants are grouped by when they fire: validation errors
//! reject before any read, funds/shares errors reject before any write,
//! and ledger errors abort the atomic commit as a whole.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the matching, pool, and settlement layers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Malformed request or market not accepting orders. No reads performed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Buyer balance cannot cover the requested notional.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    /// Seller position cannot cover the requested shares.
    #[error("insufficient shares: required {required}, available {available}")]
    InsufficientShares { required: Decimal, available: Decimal },

    /// The AMM leg cannot absorb the remainder. `suggested` is a smaller
    /// amount the caller may retry with; advisory only.
    #[error("insufficient liquidity for {requested}")]
    InsufficientLiquidity {
        requested: Decimal,
        suggested: Option<Decimal>,
    },

    /// Pool constant has drifted from the traded reserve beyond tolerance.
    /// Trading on the outcome refuses until an explicit rebalance runs.
    #[error(
        "pool invariant violated on outcome {outcome_id}: k={k_constant}, reserve={reserve}, deviation={deviation}"
    )]
    InvariantViolation {
        outcome_id: Uuid,
        k_constant: Decimal,
        reserve: Decimal,
        deviation: Decimal,
    },

    #[error("market {0} not found")]
    MarketNotFound(Uuid),

    #[error("outcome {0} not found")]
    OutcomeNotFound(Uuid),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    /// Cancel raced a concurrent match that already completed the order.
    #[error("order {0} already filled")]
    AlreadyFilled(Uuid),

    /// Settlement was already performed; the original receipt stands.
    #[error("market {0} already settled")]
    AlreadySettled(Uuid),

    /// Per-market lock could not be acquired in time, or optimistic
    /// retries were exhausted. Retryable by the caller.
    #[error("market busy, retry later")]
    Busy,

    /// Atomic commit failure reported by the ledger.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors from the atomic ledger commit.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    /// Optimistic version conflict on the market row. The engine retries
    /// matching from a fresh read; never surfaced raw to callers.
    #[error("concurrent modification: expected version {expected}, found {found}")]
    ConcurrentModification { expected: u64, found: u64 },

    /// A constraint (non-negative balance, non-negative shares) would be
    /// violated. The whole batch aborts.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Underlying store failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ledger_error_converts() {
        let err: EngineError = LedgerError::ConstraintViolation("negative balance".into()).into();
        assert!(matches!(err, EngineError::Ledger(_)));
    }

    #[test]
    fn test_display_includes_amounts() {
        let err = EngineError::InsufficientFunds {
            required: dec!(100),
            available: dec!(40),
        };
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("40"));
    }
}
