//! Core trading domain types.
//!
//! Markets, outcomes, the per-market liquidity pool, orders, positions,
//! and the immutable transaction audit record. All money-bearing fields
//! are `Decimal`; every mutation helper routes its result through the
//! fixed-point rules in [`super::fixed`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fixed;

// ────────────────────────────────────────────
// Identifier aliases
// ────────────────────────────────────────────

pub type UserId = Uuid;
pub type MarketId = Uuid;
pub type OutcomeId = Uuid;
pub type OrderId = Uuid;

// ────────────────────────────────────────────
// Enums
// ────────────────────────────────────────────

/// Lifecycle status of a market. Markets are archived, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    /// Created but not yet open for trading.
    Scheduled,
    /// Accepting orders, match not started.
    Open,
    /// Accepting orders, match in progress.
    Live,
    /// Trading paused by an operator.
    Suspended,
    /// Trading frozen, final score fixed, awaiting settlement.
    Closed,
    /// Settled; every position terminal.
    Settled,
}

impl MarketStatus {
    /// Whether new orders are accepted in this status.
    pub const fn accepts_orders(self) -> bool {
        matches!(self, Self::Open | Self::Live)
    }
}

/// Trade side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// The side of resting orders an incoming order of this side matches.
    pub const fn counter(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order execution type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Fill fully (book + AMM) or reject/rest per policy. Never rests as-is.
    Market,
    /// Match within the price limit; remainder rests on the book.
    Limit,
}

/// Lifecycle status of an order: `Pending → Partial → Filled`, or
/// `Pending/Partial → Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled)
    }
}

/// Kind of audit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Buy,
    Sell,
    SettlementPayout,
}

// ────────────────────────────────────────────
// Entities
// ────────────────────────────────────────────

/// A sports match market with 2 or 3 outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    /// Human-readable fixture name.
    pub name: String,
    pub status: MarketStatus,
    /// Final score, fixed when the market closes (e.g. "2-1").
    pub final_score: Option<String>,
    /// Winning outcome, set at settlement.
    pub winning_outcome_id: Option<OutcomeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One outcome of a market, with its own AMM reserve.
///
/// Invariants while the market is open: `0.01 ≤ current_price ≤ 0.99`,
/// `reserve > 0`, `total_shares > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub id: OutcomeId,
    pub market_id: MarketId,
    /// Outcome label (e.g. "Home", "Draw", "Away").
    pub label: String,
    /// Shares held by the pool, available to sell to traders.
    pub total_shares: Decimal,
    /// Currency reserve backing this outcome.
    pub reserve: Decimal,
    pub current_price: Decimal,
    /// Traded notional accumulated by the core. Windowing the figure
    /// down to a rolling 24h is the store's concern; the engine only
    /// ever adds.
    pub volume_24h: Decimal,
}

/// Per-market liquidity pool parameters (single-reserve design:
/// `k_constant` tracks the reserve of the actively traded outcome).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub market_id: MarketId,
    pub k_constant: Decimal,
    pub total_liquidity: Decimal,
    pub available_liquidity: Decimal,
    /// Fee rate applied to every fill. Configuration, never hard-coded.
    pub fee_rate: Decimal,
}

/// A user's order, created on submit and mutated per partial match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,
    pub side: TradeSide,
    pub order_type: OrderType,
    /// Requested shares. For market buys this is unknown upfront and is
    /// finalized to the executed total when the order completes.
    pub shares: Decimal,
    pub executed_shares: Decimal,
    /// Limit price for limit orders.
    pub price_limit: Option<Decimal>,
    pub status: OrderStatus,
    /// Requested notional (buys) or expected proceeds basis (sells).
    pub total_amount: Decimal,
    pub executed_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradeOrder {
    /// Create a market order. `amount` is notional currency for buys and
    /// shares for sells.
    pub fn new_market(
        user_id: UserId,
        market_id: MarketId,
        outcome_id: OutcomeId,
        side: TradeSide,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        let (shares, total_amount) = match side {
            TradeSide::Buy => (Decimal::ZERO, fixed::round_currency(amount)),
            TradeSide::Sell => (fixed::round_shares(amount), Decimal::ZERO),
        };
        Self {
            id: Uuid::new_v4(),
            user_id,
            market_id,
            outcome_id,
            side,
            order_type: OrderType::Market,
            shares,
            executed_shares: Decimal::ZERO,
            price_limit: None,
            status: OrderStatus::Pending,
            total_amount,
            executed_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a limit order for `shares` at `price_limit`.
    pub fn new_limit(
        user_id: UserId,
        market_id: MarketId,
        outcome_id: OutcomeId,
        side: TradeSide,
        shares: Decimal,
        price_limit: Decimal,
    ) -> Self {
        let shares = fixed::round_shares(shares);
        let price_limit = fixed::clamp_price(price_limit);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            market_id,
            outcome_id,
            side,
            order_type: OrderType::Limit,
            shares,
            executed_shares: Decimal::ZERO,
            price_limit: Some(price_limit),
            status: OrderStatus::Pending,
            total_amount: fixed::round_currency(shares * price_limit),
            executed_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Shares still unexecuted on a resting order.
    pub fn remaining_shares(&self) -> Decimal {
        fixed::round_shares(self.shares - self.executed_shares)
    }

    /// Record a fill of `shares` for `amount` currency and advance the
    /// `pending → partial → filled` state machine.
    pub fn apply_fill(&mut self, shares: Decimal, amount: Decimal) {
        self.executed_shares = fixed::round_shares(self.executed_shares + shares);
        self.executed_amount = fixed::round_currency(self.executed_amount + amount);
        self.status = if self.shares > Decimal::ZERO && self.executed_shares < self.shares {
            OrderStatus::Partial
        } else {
            OrderStatus::Filled
        };
        self.updated_at = Utc::now();
    }

    /// Finalize a market order whose share total was open-ended.
    pub fn complete(&mut self) {
        self.shares = self.executed_shares;
        self.status = OrderStatus::Filled;
        self.updated_at = Utc::now();
    }
}

/// A user's holding in one outcome, created on first buy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,
    pub shares_owned: Decimal,
    /// Weighted-average cost basis.
    pub avg_buy_price: Decimal,
    pub total_invested: Decimal,
    pub realized_pnl: Decimal,
    pub is_active: bool,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn new(user_id: UserId, market_id: MarketId, outcome_id: OutcomeId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            market_id,
            outcome_id,
            shares_owned: Decimal::ZERO,
            avg_buy_price: Decimal::ZERO,
            total_invested: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            is_active: true,
            opened_at: now,
            updated_at: now,
        }
    }

    /// Fold a buy into the weighted-average cost basis:
    /// `new_avg = (old_invested + spent) / (old_shares + new_shares)`.
    pub fn apply_buy(&mut self, shares: Decimal, spent: Decimal) {
        let new_shares = fixed::round_shares(self.shares_owned + shares);
        let new_invested = fixed::round_currency(self.total_invested + spent);
        if new_shares > Decimal::ZERO {
            self.avg_buy_price = fixed::round_price(new_invested / new_shares);
        }
        self.shares_owned = new_shares;
        self.total_invested = new_invested;
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    /// Fold a sell in and return the realized pnl delta
    /// (`proceeds − avg_buy_price · shares`).
    pub fn apply_sell(&mut self, shares: Decimal, proceeds: Decimal) -> Decimal {
        let cost_basis = fixed::round_currency(self.avg_buy_price * shares);
        let pnl = fixed::round_currency(proceeds - cost_basis);
        self.shares_owned = fixed::round_shares(self.shares_owned - shares);
        self.total_invested = fixed::round_currency(self.total_invested - cost_basis);
        self.realized_pnl = fixed::round_currency(self.realized_pnl + pnl);
        if self.shares_owned <= Decimal::ZERO {
            self.shares_owned = Decimal::ZERO;
            self.is_active = false;
        }
        self.updated_at = Utc::now();
        pnl
    }

    /// Terminal-settle this position at `payout` currency.
    pub fn settle(&mut self, payout: Decimal) {
        self.realized_pnl = fixed::round_currency(self.realized_pnl + payout - self.total_invested);
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

/// Immutable per-fill audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,
    pub tx_type: TransactionType,
    pub shares: Decimal,
    pub price_per_share: Decimal,
    pub total_amount: Decimal,
    pub fees: Decimal,
    /// Signed change applied to the user's balance.
    pub balance_change: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Consistent snapshot of one market's shared mutable state, versioned
/// for optimistic concurrency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub market: Market,
    pub outcomes: Vec<Outcome>,
    pub pool: LiquidityPool,
    /// Bumped on every committed ledger batch for this market.
    pub version: u64,
}

impl MarketState {
    pub fn outcome(&self, outcome_id: OutcomeId) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.id == outcome_id)
    }
}

/// Receipt produced once per market settlement; returned unchanged on
/// repeat invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub market_id: MarketId,
    pub winning_outcome_id: OutcomeId,
    pub settled_positions: usize,
    pub winners_count: usize,
    pub total_payout: Decimal,
    pub settled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ids() -> (UserId, MarketId, OutcomeId) {
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_status_accepts_orders() {
        assert!(MarketStatus::Open.accepts_orders());
        assert!(MarketStatus::Live.accepts_orders());
        assert!(!MarketStatus::Closed.accepts_orders());
        assert!(!MarketStatus::Suspended.accepts_orders());
    }

    #[test]
    fn test_order_state_machine() {
        let (u, m, o) = ids();
        let mut order = TradeOrder::new_limit(u, m, o, TradeSide::Sell, dec!(50), dec!(0.40));
        assert_eq!(order.status, OrderStatus::Pending);

        order.apply_fill(dec!(20), dec!(8.00));
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.remaining_shares(), dec!(30));

        order.apply_fill(dec!(30), dec!(12.00));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.executed_amount, dec!(20.00));
    }

    #[test]
    fn test_position_weighted_average() {
        let (u, m, o) = ids();
        let mut pos = Position::new(u, m, o);
        pos.apply_buy(dec!(100), dec!(40.00));
        assert_eq!(pos.avg_buy_price, dec!(0.40));

        pos.apply_buy(dec!(100), dec!(60.00));
        assert_eq!(pos.avg_buy_price, dec!(0.50));
        assert_eq!(pos.total_invested, dec!(100.00));
    }

    #[test]
    fn test_position_sell_realizes_pnl() {
        let (u, m, o) = ids();
        let mut pos = Position::new(u, m, o);
        pos.apply_buy(dec!(100), dec!(40.00));

        let pnl = pos.apply_sell(dec!(50), dec!(30.00));
        assert_eq!(pnl, dec!(10.00));
        assert_eq!(pos.shares_owned, dec!(50));
        assert!(pos.is_active);

        pos.apply_sell(dec!(50), dec!(15.00));
        assert!(!pos.is_active);
        assert_eq!(pos.shares_owned, Decimal::ZERO);
    }

    #[test]
    fn test_position_settle_marks_inactive() {
        let (u, m, o) = ids();
        let mut pos = Position::new(u, m, o);
        pos.apply_buy(dec!(25), dec!(10.00));
        pos.settle(dec!(25.00));
        assert!(!pos.is_active);
        assert_eq!(pos.realized_pnl, dec!(15.00));
    }

    #[test]
    fn test_counter_side() {
        assert_eq!(TradeSide::Buy.counter(), TradeSide::Sell);
        assert_eq!(TradeSide::Sell.counter(), TradeSide::Buy);
    }
}
