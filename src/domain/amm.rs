//! Constant-product AMM pool for a single outcome.
//!
//! Single-reserve variant: the pool constant `k` tracks the currency
//! reserve of the actively traded outcome rather than a classic x·y
//! product. Buying cash A (net of fee) moves the reserve to
//! `reserve + A` and pays out `reserve · (1 − k/(reserve + A))` shares;
//! selling mirrors the transform on the share side.
//!
//! `k` is only ever rewritten by an explicit [`AmmPool::rebalance`].
//! Trading drift beyond tolerance is flagged by [`AmmPool::validate`]
//! and refuses further trades until the rebalance runs.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::EngineError;
use super::fixed;
use super::market::{LiquidityPool, Outcome, OutcomeId, TradeSide};

/// Priced outcome of an AMM leg, before or after application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmmQuote {
    pub side: TradeSide,
    /// Gross input: currency for buys, shares for sells.
    pub amount_in: Decimal,
    /// Shares received (buy) or net currency proceeds (sell).
    pub shares_or_cost: Decimal,
    pub fees: Decimal,
    pub new_price: Decimal,
    /// Percentage price change caused by this trade.
    pub price_impact: Decimal,
    pub new_reserve: Decimal,
    pub new_total_shares: Decimal,
}

/// Per-outcome pool state lifted out of a [`MarketState`] snapshot.
///
/// [`MarketState`]: super::market::MarketState
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmPool {
    pub outcome_id: OutcomeId,
    pub reserve: Decimal,
    pub total_shares: Decimal,
    pub current_price: Decimal,
    pub k_constant: Decimal,
    pub fee_rate: Decimal,
}

impl AmmPool {
    /// Lift the pool view for one outcome out of market state.
    pub fn from_state(outcome: &Outcome, pool: &LiquidityPool) -> Self {
        Self {
            outcome_id: outcome.id,
            reserve: outcome.reserve,
            total_shares: outcome.total_shares,
            current_price: outcome.current_price,
            k_constant: pool.k_constant,
            fee_rate: pool.fee_rate,
        }
    }

    /// Price a trade against the pool without mutating it.
    ///
    /// For buys `amount` is gross currency in; for sells it is shares in.
    pub fn quote(&self, side: TradeSide, amount: Decimal) -> Result<AmmQuote, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "trade amount must be positive, got {amount}"
            )));
        }
        match side {
            TradeSide::Buy => self.quote_buy(amount),
            TradeSide::Sell => self.quote_sell(amount),
        }
    }

    /// Price and apply a trade, updating reserve, shares, and price.
    /// `k_constant` is deliberately left untouched (see module docs).
    pub fn apply(&mut self, side: TradeSide, amount: Decimal) -> Result<AmmQuote, EngineError> {
        let quote = self.quote(side, amount)?;
        self.reserve = quote.new_reserve;
        self.total_shares = quote.new_total_shares;
        self.current_price = quote.new_price;
        debug!(
            outcome_id = %self.outcome_id,
            side = %side,
            amount = %amount,
            new_price = %self.current_price,
            "AMM leg applied"
        );
        Ok(quote)
    }

    fn quote_buy(&self, gross: Decimal) -> Result<AmmQuote, EngineError> {
        let fees = fixed::round_currency(gross * self.fee_rate);
        let net = gross - fees;
        let new_reserve = self.reserve + net;
        if new_reserve <= Decimal::ZERO {
            return Err(self.cannot_absorb(gross));
        }

        let ratio = self.k_constant / new_reserve;
        if ratio >= Decimal::ONE {
            return Err(self.cannot_absorb(gross));
        }

        let shares_out = fixed::round_shares(self.reserve * (Decimal::ONE - ratio));
        let new_total_shares = fixed::round_shares(self.total_shares - shares_out);
        if shares_out <= Decimal::ZERO || new_total_shares <= Decimal::ZERO {
            return Err(self.cannot_absorb(gross));
        }

        let new_price = fixed::clamp_price(new_reserve / new_total_shares);
        Ok(AmmQuote {
            side: TradeSide::Buy,
            amount_in: gross,
            shares_or_cost: shares_out,
            fees,
            new_price,
            price_impact: self.impact(new_price),
            new_reserve: fixed::round_currency(new_reserve),
            new_total_shares,
        })
    }

    fn quote_sell(&self, shares: Decimal) -> Result<AmmQuote, EngineError> {
        let new_total_shares = fixed::round_shares(self.total_shares + shares);
        if new_total_shares <= Decimal::ZERO {
            return Err(self.cannot_absorb(shares));
        }

        let gross = fixed::round_currency(self.reserve * shares / new_total_shares);
        let fees = fixed::round_currency(gross * self.fee_rate);
        let net = fixed::round_currency(gross - fees);
        let new_reserve = fixed::round_currency(self.reserve - gross);
        if net <= Decimal::ZERO || new_reserve <= Decimal::ZERO {
            return Err(self.cannot_absorb(shares));
        }

        let new_price = fixed::clamp_price(new_reserve / new_total_shares);
        Ok(AmmQuote {
            side: TradeSide::Sell,
            amount_in: shares,
            shares_or_cost: net,
            fees,
            new_price,
            price_impact: self.impact(new_price),
            new_reserve,
            new_total_shares,
        })
    }

    /// Check the k ≈ reserve invariant within `tolerance` (fractional,
    /// e.g. 0.10 for 10%).
    pub fn validate(&self, tolerance: Decimal) -> Result<(), EngineError> {
        if self.reserve <= Decimal::ZERO {
            return Err(EngineError::InvariantViolation {
                outcome_id: self.outcome_id,
                k_constant: self.k_constant,
                reserve: self.reserve,
                deviation: Decimal::ONE,
            });
        }
        let deviation = ((self.k_constant - self.reserve) / self.reserve).abs();
        if deviation > tolerance {
            return Err(EngineError::InvariantViolation {
                outcome_id: self.outcome_id,
                k_constant: self.k_constant,
                reserve: self.reserve,
                deviation: fixed::round_price(deviation),
            });
        }
        Ok(())
    }

    /// Re-anchor `k` to the current reserve. Price and shares are left
    /// untouched. Idempotent.
    pub fn rebalance(&mut self) {
        self.k_constant = self.reserve;
    }

    fn impact(&self, new_price: Decimal) -> Decimal {
        if self.current_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        fixed::round_price((new_price - self.current_price) / self.current_price * dec!(100))
    }

    fn cannot_absorb(&self, requested: Decimal) -> EngineError {
        // Advisory retry hint; half the requested size, floored at the
        // minimum tradable budget.
        let suggested = fixed::round_currency(requested / dec!(2));
        EngineError::InsufficientLiquidity {
            requested,
            suggested: (suggested >= fixed::MIN_BUDGET).then_some(suggested),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pool(reserve: Decimal, shares: Decimal, k: Decimal, fee_rate: Decimal) -> AmmPool {
        AmmPool {
            outcome_id: Uuid::new_v4(),
            reserve,
            total_shares: shares,
            current_price: fixed::clamp_price(reserve / shares),
            k_constant: k,
            fee_rate,
        }
    }

    #[test]
    fn test_buy_single_reserve_formula() {
        // reserve=10000, k=10000, fee=0, buy $1000:
        // shares = 10000 * (1 - 10000/11000) = 909.09090909
        let p = pool(dec!(10000), dec!(10000), dec!(10000), Decimal::ZERO);
        let q = p.quote(TradeSide::Buy, dec!(1000)).unwrap();
        assert_eq!(q.shares_or_cost, dec!(909.09090909));
        assert_eq!(q.fees, Decimal::ZERO);
        assert_eq!(q.new_reserve, dec!(11000));
        // Raw price 11000/9090.91 ≈ 1.21, clamped into the band.
        assert_eq!(q.new_price, dec!(0.99));
    }

    #[test]
    fn test_buy_deducts_fee_from_input() {
        let p = pool(dec!(10000), dec!(10000), dec!(10000), dec!(0.02));
        let q = p.quote(TradeSide::Buy, dec!(1000)).unwrap();
        assert_eq!(q.fees, dec!(20.00));
        // Net 980 moves the reserve.
        assert_eq!(q.new_reserve, dec!(10980));
        assert!(q.shares_or_cost < dec!(909.09090909));
    }

    #[test]
    fn test_buy_never_decreases_price() {
        let p = pool(dec!(5000), dec!(10000), dec!(5000), dec!(0.02));
        let q = p.quote(TradeSide::Buy, dec!(250)).unwrap();
        assert!(q.new_price >= p.current_price);
        assert!(q.price_impact >= Decimal::ZERO);
    }

    #[test]
    fn test_sell_never_increases_price() {
        let p = pool(dec!(5000), dec!(10000), dec!(5000), Decimal::ZERO);
        let q = p.quote(TradeSide::Sell, dec!(500)).unwrap();
        assert!(q.new_price <= p.current_price);
        // proceeds = 5000 * 500 / 10500 = 238.10
        assert_eq!(q.shares_or_cost, dec!(238.10));
        assert_eq!(q.new_reserve, dec!(4761.90));
    }

    #[test]
    fn test_sell_fee_on_gross_proceeds() {
        let p = pool(dec!(5000), dec!(10000), dec!(5000), dec!(0.03));
        let q = p.quote(TradeSide::Sell, dec!(500)).unwrap();
        let gross = dec!(238.10);
        assert_eq!(q.fees, fixed::round_currency(gross * dec!(0.03)));
        assert_eq!(q.shares_or_cost, gross - q.fees);
    }

    #[test]
    fn test_stale_k_cannot_absorb_buy() {
        // k drifted above reserve + net: ratio >= 1.
        let p = pool(dec!(10000), dec!(10000), dec!(12000), Decimal::ZERO);
        let err = p.quote(TradeSide::Buy, dec!(1000)).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn test_liquidity_error_suggests_smaller_amount() {
        let p = pool(dec!(10000), dec!(10000), dec!(12000), Decimal::ZERO);
        match p.quote(TradeSide::Buy, dec!(1000)) {
            Err(EngineError::InsufficientLiquidity { suggested, .. }) => {
                assert_eq!(suggested, Some(dec!(500.00)));
            }
            other => panic!("expected InsufficientLiquidity, got {other:?}"),
        }
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let p = pool(dec!(10000), dec!(10000), dec!(10000), Decimal::ZERO);
        assert!(matches!(
            p.quote(TradeSide::Buy, Decimal::ZERO),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            p.quote(TradeSide::Sell, dec!(-5)),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_apply_updates_state_but_not_k() {
        let mut p = pool(dec!(10000), dec!(10000), dec!(10000), Decimal::ZERO);
        let q = p.apply(TradeSide::Buy, dec!(1000)).unwrap();
        assert_eq!(p.reserve, q.new_reserve);
        assert_eq!(p.total_shares, q.new_total_shares);
        assert_eq!(p.current_price, q.new_price);
        assert_eq!(p.k_constant, dec!(10000));
    }

    #[test]
    fn test_validate_within_tolerance() {
        let p = pool(dec!(11000), dec!(9090), dec!(10000), Decimal::ZERO);
        // deviation = 1000/11000 ≈ 9.09%
        assert!(p.validate(dec!(0.10)).is_ok());
        assert!(matches!(
            p.validate(dec!(0.05)),
            Err(EngineError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn test_rebalance_is_idempotent() {
        let mut p = pool(dec!(11000), dec!(9090), dec!(10000), Decimal::ZERO);
        p.rebalance();
        assert_eq!(p.k_constant, dec!(11000));
        let price_before = p.current_price;
        p.rebalance();
        assert_eq!(p.k_constant, dec!(11000));
        assert_eq!(p.current_price, price_before);
        assert!(p.validate(dec!(0.10)).is_ok());
    }
}
