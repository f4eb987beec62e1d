//! Repository Port - Persistent Store Interface
//!
//! The persistent store is an external ACID-transactional dependency;
//! the core only sees this trait. Reads return consistent snapshots,
//! and every write goes through [`MarketRepository::apply_ledger_effects`]
//! as one atomic batch guarded by an optimistic market version.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::error::{EngineError, LedgerError};
use crate::domain::market::{
    LiquidityPool, Market, MarketId, MarketState, OrderId, Outcome, OutcomeId, Position,
    SettlementReceipt, TradeOrder, TradeSide, Transaction, UserId,
};

/// Signed balance delta for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub user_id: UserId,
    pub delta: Decimal,
}

/// Every mutation belonging to one trade or settlement, committed as a
/// single atomic unit or not at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEffects {
    pub market_id: MarketId,
    /// Version the market state was read at; commit fails with
    /// [`LedgerError::ConcurrentModification`] if it moved.
    pub expected_version: u64,
    pub balance_changes: Vec<BalanceChange>,
    pub order_upserts: Vec<TradeOrder>,
    pub position_upserts: Vec<Position>,
    pub outcome_upserts: Vec<Outcome>,
    pub pool_update: Option<LiquidityPool>,
    pub market_update: Option<Market>,
    pub transactions: Vec<Transaction>,
    pub settlement_receipt: Option<SettlementReceipt>,
}

impl LedgerEffects {
    /// Empty batch against a known market version.
    pub fn new(market_id: MarketId, expected_version: u64) -> Self {
        Self {
            market_id,
            expected_version,
            balance_changes: Vec::new(),
            order_upserts: Vec::new(),
            position_upserts: Vec::new(),
            outcome_upserts: Vec::new(),
            pool_update: None,
            market_update: None,
            transactions: Vec::new(),
            settlement_receipt: None,
        }
    }

    /// Whether the batch carries any mutation at all.
    pub fn is_empty(&self) -> bool {
        self.balance_changes.is_empty()
            && self.order_upserts.is_empty()
            && self.position_upserts.is_empty()
            && self.outcome_upserts.is_empty()
            && self.pool_update.is_none()
            && self.market_update.is_none()
            && self.transactions.is_empty()
            && self.settlement_receipt.is_none()
    }
}

/// Proof of a committed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub market_id: MarketId,
    pub new_version: u64,
    pub transactions_written: usize,
    pub committed_at: DateTime<Utc>,
}

/// Trait the core consumes for all persistence.
///
/// Implementations must guarantee ACID semantics for
/// `apply_ledger_effects`: no reader ever observes a partially applied
/// batch, and a failed batch leaves the store untouched.
#[async_trait]
pub trait MarketRepository: Send + Sync + 'static {
    /// Consistent snapshot of one market's shared state.
    async fn market_state(&self, market_id: MarketId) -> Result<MarketState, EngineError>;

    /// Resting (pending/partial) orders for an outcome side, in
    /// price-time priority order, at most `limit` entries.
    async fn resting_orders(
        &self,
        outcome_id: OutcomeId,
        side: TradeSide,
        limit: usize,
    ) -> Result<Vec<TradeOrder>, EngineError>;

    async fn order(&self, order_id: OrderId) -> Result<TradeOrder, EngineError>;

    async fn position(
        &self,
        user_id: UserId,
        outcome_id: OutcomeId,
    ) -> Result<Option<Position>, EngineError>;

    /// Active positions across all outcomes of a market.
    async fn positions_for_market(
        &self,
        market_id: MarketId,
    ) -> Result<Vec<Position>, EngineError>;

    async fn balance(&self, user_id: UserId) -> Result<Decimal, EngineError>;

    /// Stored settlement receipt, if the market has settled.
    async fn settlement_receipt(
        &self,
        market_id: MarketId,
    ) -> Result<Option<SettlementReceipt>, EngineError>;

    /// Commit one atomic batch (see [`LedgerEffects`]).
    async fn apply_ledger_effects(
        &self,
        effects: LedgerEffects,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Append-only audit trail for a user, newest first.
    async fn transactions_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Transaction>, EngineError>;
}
