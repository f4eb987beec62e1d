//! Fixed-point arithmetic rules for every money-bearing quantity.
//!
//! Centralizes the per-quantity precision rules (shares 8dp, currency
//! 2dp, price 6dp) that would otherwise be scattered across storage
//! columns. Rounding is half-away-from-zero everywhere, and prices are
//! clamped to [0.01, 0.99] after rounding.

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use tracing::warn;

/// Lower price bound for any outcome share.
pub const MIN_PRICE: Decimal = dec!(0.01);

/// Upper price bound for any outcome share.
pub const MAX_PRICE: Decimal = dec!(0.99);

/// Smallest budget worth matching; book walks stop below this.
pub const MIN_BUDGET: Decimal = dec!(0.01);

/// Semantic quantity kind, each with its own persisted scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityKind {
    /// Outcome shares, 8 decimal places.
    Shares,
    /// Currency amounts (balances, costs, fees), 2 decimal places.
    Currency,
    /// Per-share prices, 6 decimal places.
    Price,
}

impl QuantityKind {
    /// Number of decimal places persisted for this quantity.
    pub const fn scale(self) -> u32 {
        match self {
            Self::Shares => 8,
            Self::Currency => 2,
            Self::Price => 6,
        }
    }
}

/// Round a value to its quantity scale, half away from zero.
pub fn round(kind: QuantityKind, value: Decimal) -> Decimal {
    value.round_dp_with_strategy(kind.scale(), RoundingStrategy::MidpointAwayFromZero)
}

/// Round to share precision (8dp).
pub fn round_shares(value: Decimal) -> Decimal {
    round(QuantityKind::Shares, value)
}

/// Round to currency precision (2dp).
pub fn round_currency(value: Decimal) -> Decimal {
    round(QuantityKind::Currency, value)
}

/// Round to price precision (6dp).
pub fn round_price(value: Decimal) -> Decimal {
    round(QuantityKind::Price, value)
}

/// Round a price and clamp it into the tradable band.
pub fn clamp_price(value: Decimal) -> Decimal {
    round_price(value).clamp(MIN_PRICE, MAX_PRICE)
}

/// Convert an untrusted `f64` into a `Decimal`.
///
/// NaN and infinities degrade to zero with a logged correction; they
/// must never reach the ledger.
pub fn sanitize_f64(raw: f64, label: &str) -> Decimal {
    if !raw.is_finite() {
        warn!(label, raw, "non-finite input corrected to zero");
        return Decimal::ZERO;
    }
    Decimal::from_f64(raw).unwrap_or_else(|| {
        warn!(label, raw, "unrepresentable input corrected to zero");
        Decimal::ZERO
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scales_per_kind() {
        assert_eq!(QuantityKind::Shares.scale(), 8);
        assert_eq!(QuantityKind::Currency.scale(), 2);
        assert_eq!(QuantityKind::Price.scale(), 6);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_currency(dec!(1.005)), dec!(1.01));
        assert_eq!(round_currency(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_price(dec!(0.1234565)), dec!(0.123457));
        assert_eq!(round_shares(dec!(90.909090905)), dec!(90.90909091));
    }

    #[test]
    fn test_clamp_price_band() {
        assert_eq!(clamp_price(dec!(1.21)), dec!(0.99));
        assert_eq!(clamp_price(dec!(0.0001)), dec!(0.01));
        assert_eq!(clamp_price(dec!(0.456789)), dec!(0.456789));
    }

    #[test]
    fn test_sanitize_rejects_non_finite() {
        assert_eq!(sanitize_f64(f64::NAN, "amount"), Decimal::ZERO);
        assert_eq!(sanitize_f64(f64::INFINITY, "amount"), Decimal::ZERO);
        assert_eq!(sanitize_f64(f64::NEG_INFINITY, "amount"), Decimal::ZERO);
        assert_eq!(sanitize_f64(12.5, "amount"), dec!(12.5));
    }
}
