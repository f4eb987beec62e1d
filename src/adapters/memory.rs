//! In-Memory Repository - Versioned Reference Adapter
//!
//! Reference implementation of the repository port backed by process
//! memory. Commits are genuinely atomic: the whole batch is validated
//! against every constraint before any row mutates, and the market
//! version check makes the optimistic-concurrency path real. Used by
//! the integration suite and as a template for database adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::error::{EngineError, LedgerError};
use crate::domain::market::{
    LiquidityPool, Market, MarketId, MarketState, OrderId, OrderStatus, Outcome, OutcomeId,
    Position, SettlementReceipt, TradeOrder, TradeSide, Transaction, UserId,
};
use crate::ports::repository::{LedgerEffects, LedgerReceipt, MarketRepository};

#[derive(Debug, Default)]
struct Store {
    markets: HashMap<MarketId, MarketState>,
    orders: HashMap<OrderId, TradeOrder>,
    positions: HashMap<(UserId, OutcomeId), Position>,
    balances: HashMap<UserId, Decimal>,
    transactions: Vec<Transaction>,
    receipts: HashMap<MarketId, SettlementReceipt>,
}

/// Thread-safe in-memory store with atomic batch commits.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a market with its outcomes and pool at version 0.
    pub async fn seed_market(
        &self,
        market: Market,
        outcomes: Vec<Outcome>,
        pool: LiquidityPool,
    ) {
        let mut store = self.store.write().await;
        store.markets.insert(
            market.id,
            MarketState {
                market,
                outcomes,
                pool,
                version: 0,
            },
        );
    }

    pub async fn seed_balance(&self, user_id: UserId, amount: Decimal) {
        self.store.write().await.balances.insert(user_id, amount);
    }

    pub async fn seed_position(&self, position: Position) {
        let mut store = self.store.write().await;
        store
            .positions
            .insert((position.user_id, position.outcome_id), position);
    }

    /// Place a resting order directly, bypassing the match engine.
    pub async fn seed_resting_order(&self, order: TradeOrder) {
        self.store.write().await.orders.insert(order.id, order);
    }
}

#[async_trait]
impl MarketRepository for InMemoryRepository {
    async fn market_state(&self, market_id: MarketId) -> Result<MarketState, EngineError> {
        self.store
            .read()
            .await
            .markets
            .get(&market_id)
            .cloned()
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    async fn resting_orders(
        &self,
        outcome_id: OutcomeId,
        side: TradeSide,
        limit: usize,
    ) -> Result<Vec<TradeOrder>, EngineError> {
        let store = self.store.read().await;
        let mut orders: Vec<TradeOrder> = store
            .orders
            .values()
            .filter(|o| {
                o.outcome_id == outcome_id
                    && o.side == side
                    && !o.status.is_terminal()
                    && o.remaining_shares() > Decimal::ZERO
                    && o.price_limit.is_some()
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            let by_price = match side {
                TradeSide::Sell => a.price_limit.cmp(&b.price_limit),
                TradeSide::Buy => b.price_limit.cmp(&a.price_limit),
            };
            by_price.then(a.created_at.cmp(&b.created_at))
        });
        orders.truncate(limit);
        Ok(orders)
    }

    async fn order(&self, order_id: OrderId) -> Result<TradeOrder, EngineError> {
        self.store
            .read()
            .await
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(EngineError::OrderNotFound(order_id))
    }

    async fn position(
        &self,
        user_id: UserId,
        outcome_id: OutcomeId,
    ) -> Result<Option<Position>, EngineError> {
        Ok(self
            .store
            .read()
            .await
            .positions
            .get(&(user_id, outcome_id))
            .cloned())
    }

    async fn positions_for_market(
        &self,
        market_id: MarketId,
    ) -> Result<Vec<Position>, EngineError> {
        Ok(self
            .store
            .read()
            .await
            .positions
            .values()
            .filter(|p| p.market_id == market_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn balance(&self, user_id: UserId) -> Result<Decimal, EngineError> {
        Ok(self
            .store
            .read()
            .await
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn settlement_receipt(
        &self,
        market_id: MarketId,
    ) -> Result<Option<SettlementReceipt>, EngineError> {
        Ok(self.store.read().await.receipts.get(&market_id).cloned())
    }

    async fn apply_ledger_effects(
        &self,
        effects: LedgerEffects,
    ) -> Result<LedgerReceipt, LedgerError> {
        let mut store = self.store.write().await;

        let found_version = store
            .markets
            .get(&effects.market_id)
            .ok_or_else(|| {
                LedgerError::Storage(format!("unknown market {}", effects.market_id))
            })?
            .version;
        if found_version != effects.expected_version {
            return Err(LedgerError::ConcurrentModification {
                expected: effects.expected_version,
                found: found_version,
            });
        }

        // Validate the whole batch before mutating anything.
        for change in &effects.balance_changes {
            let current = store
                .balances
                .get(&change.user_id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            if current + change.delta < Decimal::ZERO {
                return Err(LedgerError::ConstraintViolation(format!(
                    "balance of {} would go negative ({} + {})",
                    change.user_id, current, change.delta
                )));
            }
        }
        for position in &effects.position_upserts {
            if position.shares_owned < Decimal::ZERO {
                return Err(LedgerError::ConstraintViolation(format!(
                    "position {}/{} would hold negative shares",
                    position.user_id, position.outcome_id
                )));
            }
        }
        for outcome in &effects.outcome_upserts {
            if outcome.reserve <= Decimal::ZERO || outcome.total_shares <= Decimal::ZERO {
                return Err(LedgerError::ConstraintViolation(format!(
                    "outcome {} would have non-positive reserve or shares",
                    outcome.id
                )));
            }
        }
        for order in &effects.order_upserts {
            if order.executed_shares > order.shares {
                return Err(LedgerError::ConstraintViolation(format!(
                    "order {} executed beyond its requested shares",
                    order.id
                )));
            }
            if order.status == OrderStatus::Filled && order.executed_shares < order.shares {
                return Err(LedgerError::ConstraintViolation(format!(
                    "order {} marked filled with unexecuted shares",
                    order.id
                )));
            }
        }

        // Apply. Past this point nothing can fail.
        for change in &effects.balance_changes {
            let entry = store
                .balances
                .entry(change.user_id)
                .or_insert(Decimal::ZERO);
            *entry += change.delta;
        }
        for position in effects.position_upserts {
            store
                .positions
                .insert((position.user_id, position.outcome_id), position);
        }
        for order in effects.order_upserts {
            store.orders.insert(order.id, order);
        }
        let transactions_written = effects.transactions.len();
        store.transactions.extend(effects.transactions);
        if let Some(receipt) = effects.settlement_receipt {
            store.receipts.insert(receipt.market_id, receipt);
        }

        let Some(state) = store.markets.get_mut(&effects.market_id) else {
            return Err(LedgerError::Storage(format!(
                "unknown market {}",
                effects.market_id
            )));
        };
        for outcome in effects.outcome_upserts {
            if let Some(existing) = state.outcomes.iter_mut().find(|o| o.id == outcome.id) {
                *existing = outcome;
            }
        }
        if let Some(pool) = effects.pool_update {
            state.pool = pool;
        }
        if let Some(market) = effects.market_update {
            state.market = market;
        }
        state.version += 1;

        debug!(
            market_id = %effects.market_id,
            version = state.version,
            "batch committed"
        );
        Ok(LedgerReceipt {
            market_id: effects.market_id,
            new_version: state.version,
            transactions_written,
            committed_at: Utc::now(),
        })
    }

    async fn transactions_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Transaction>, EngineError> {
        Ok(self
            .store
            .read()
            .await
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
