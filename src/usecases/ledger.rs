//! Ledger Writer - Atomic Effect Batching
//!
//! Folds everything a trade or settlement touches (balances, positions,
//! orders, pool, outcome rows, audit transactions) into one
//! [`LedgerEffects`] batch and commits it through the repository port.
//! A batch commits whole or not at all; optimistic conflicts bubble up
//! for the caller's retry loop.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::domain::fixed;
use crate::domain::market::{
    LiquidityPool, Market, MarketId, Outcome, Position, SettlementReceipt, TradeOrder, Transaction,
    UserId,
};
use crate::ports::repository::{
    BalanceChange, LedgerEffects, LedgerReceipt, MarketRepository,
};
use crate::domain::error::LedgerError;

/// Incrementally assembles one atomic [`LedgerEffects`] batch.
///
/// Balance deltas for the same user are merged so a user appearing on
/// both sides of a trade nets out to a single row change.
#[derive(Debug)]
pub struct EffectsBuilder {
    effects: LedgerEffects,
}

impl EffectsBuilder {
    pub fn new(market_id: MarketId, expected_version: u64) -> Self {
        Self {
            effects: LedgerEffects::new(market_id, expected_version),
        }
    }

    /// Add a signed balance delta, merging with any prior delta for the
    /// same user.
    pub fn balance_change(&mut self, user_id: UserId, delta: Decimal) {
        let delta = fixed::round_currency(delta);
        if delta == Decimal::ZERO {
            return;
        }
        if let Some(existing) = self
            .effects
            .balance_changes
            .iter_mut()
            .find(|c| c.user_id == user_id)
        {
            existing.delta = fixed::round_currency(existing.delta + delta);
        } else {
            self.effects.balance_changes.push(BalanceChange { user_id, delta });
        }
    }

    pub fn upsert_order(&mut self, order: TradeOrder) {
        self.effects.order_upserts.push(order);
    }

    pub fn upsert_position(&mut self, position: Position) {
        self.effects.position_upserts.push(position);
    }

    pub fn upsert_outcome(&mut self, outcome: Outcome) {
        self.effects.outcome_upserts.push(outcome);
    }

    pub fn set_pool(&mut self, pool: LiquidityPool) {
        self.effects.pool_update = Some(pool);
    }

    pub fn set_market(&mut self, market: Market) {
        self.effects.market_update = Some(market);
    }

    pub fn record_transaction(&mut self, tx: Transaction) {
        self.effects.transactions.push(tx);
    }

    pub fn set_settlement_receipt(&mut self, receipt: SettlementReceipt) {
        self.effects.settlement_receipt = Some(receipt);
    }

    pub fn build(self) -> LedgerEffects {
        self.effects
    }
}

/// Commits effect batches through the repository port.
pub struct LedgerWriter<R: MarketRepository> {
    repo: Arc<R>,
}

impl<R: MarketRepository> LedgerWriter<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Commit one batch atomically.
    ///
    /// `ConcurrentModification` is returned untouched so the matching
    /// loop can retry from a fresh read; `ConstraintViolation` aborts
    /// the trade as a whole.
    #[instrument(skip(self, effects), fields(market_id = %effects.market_id))]
    pub async fn apply_atomically(
        &self,
        effects: LedgerEffects,
    ) -> Result<LedgerReceipt, LedgerError> {
        debug!(
            balances = effects.balance_changes.len(),
            orders = effects.order_upserts.len(),
            positions = effects.position_upserts.len(),
            transactions = effects.transactions.len(),
            "committing ledger batch"
        );
        self.repo.apply_ledger_effects(effects).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_balance_changes_merge_per_user() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut builder = EffectsBuilder::new(Uuid::new_v4(), 1);
        builder.balance_change(user, dec!(-100.00));
        builder.balance_change(other, dec!(20.00));
        builder.balance_change(user, dec!(30.00));

        let effects = builder.build();
        assert_eq!(effects.balance_changes.len(), 2);
        let merged = effects
            .balance_changes
            .iter()
            .find(|c| c.user_id == user)
            .unwrap();
        assert_eq!(merged.delta, dec!(-70.00));
    }

    #[test]
    fn test_zero_delta_not_recorded() {
        let mut builder = EffectsBuilder::new(Uuid::new_v4(), 1);
        builder.balance_change(Uuid::new_v4(), Decimal::ZERO);
        assert!(builder.build().balance_changes.is_empty());
    }
}
