//! Settlement Engine - Terminal Payout of Closed Markets
//!
//! Closing a market freezes trading and fixes the final score;
//! settlement then pays every winning share $1 and marks all positions
//! terminal, as one atomic ledger batch. Settlement is idempotent:
//! re-invocation returns the original receipt unchanged and never
//! double-pays.
//!
//! Score-based winner inference is advisory UI convenience only. Money
//! movement always takes an explicitly confirmed winning outcome.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::error::EngineError;
use crate::domain::fixed;
use crate::domain::market::{
    Market, MarketId, MarketStatus, Outcome, OutcomeId, SettlementReceipt, Transaction,
    TransactionType,
};
use crate::ports::repository::MarketRepository;

use super::ledger::{EffectsBuilder, LedgerWriter};
use super::locks::MarketLocks;

/// Settles closed markets through the shared ledger path.
pub struct SettlementEngine<R: MarketRepository> {
    repo: Arc<R>,
    ledger: LedgerWriter<R>,
    locks: Arc<MarketLocks>,
}

impl<R: MarketRepository> SettlementEngine<R> {
    pub fn new(repo: Arc<R>, locks: Arc<MarketLocks>) -> Self {
        let ledger = LedgerWriter::new(Arc::clone(&repo));
        Self { repo, ledger, locks }
    }

    /// Freeze trading and fix the final score. Required before settle.
    #[instrument(skip(self))]
    pub async fn close_market(
        &self,
        market_id: MarketId,
        final_score: &str,
    ) -> Result<Market, EngineError> {
        let _guard = self.locks.acquire(market_id).await?;
        let state = self.repo.market_state(market_id).await?;

        match state.market.status {
            MarketStatus::Settled => return Err(EngineError::AlreadySettled(market_id)),
            MarketStatus::Closed => return Ok(state.market),
            _ => {}
        }

        let mut market = state.market.clone();
        market.status = MarketStatus::Closed;
        market.final_score = Some(final_score.to_string());
        market.updated_at = Utc::now();

        let mut builder = EffectsBuilder::new(market_id, state.version);
        builder.set_market(market.clone());
        self.ledger.apply_atomically(builder.build()).await?;

        info!(market_id = %market_id, final_score, "market closed");
        Ok(market)
    }

    /// Terminal-settle every active position on a closed market.
    ///
    /// Winning positions are paid $1 per share; every position goes
    /// inactive; the market is marked Settled with a stored receipt.
    /// Invoking again returns that receipt unchanged.
    #[instrument(skip(self))]
    pub async fn settle(
        &self,
        market_id: MarketId,
        winning_outcome_id: OutcomeId,
    ) -> Result<SettlementReceipt, EngineError> {
        // Exclusive market lock: settlement blocks new submissions.
        let _guard = self.locks.acquire(market_id).await?;
        let state = self.repo.market_state(market_id).await?;

        if state.market.status == MarketStatus::Settled {
            if let Some(receipt) = self.repo.settlement_receipt(market_id).await? {
                info!(market_id = %market_id, "already settled, returning original receipt");
                return Ok(receipt);
            }
            return Err(EngineError::AlreadySettled(market_id));
        }
        if state.market.status != MarketStatus::Closed {
            return Err(EngineError::Validation(format!(
                "market {market_id} must be closed before settlement (status {:?})",
                state.market.status
            )));
        }
        if state.outcome(winning_outcome_id).is_none() {
            return Err(EngineError::OutcomeNotFound(winning_outcome_id));
        }

        let positions = self.repo.positions_for_market(market_id).await?;
        let mut builder = EffectsBuilder::new(market_id, state.version);
        let mut settled_positions = 0usize;
        let mut winners_count = 0usize;
        let mut total_payout = Decimal::ZERO;

        for mut position in positions {
            if !position.is_active {
                continue;
            }
            let won = position.outcome_id == winning_outcome_id;
            // Each winning share settles to $1.
            let payout = if won {
                fixed::round_currency(position.shares_owned)
            } else {
                Decimal::ZERO
            };

            if payout > Decimal::ZERO {
                winners_count += 1;
                total_payout = fixed::round_currency(total_payout + payout);
                builder.balance_change(position.user_id, payout);
                builder.record_transaction(Transaction {
                    id: Uuid::new_v4(),
                    user_id: position.user_id,
                    market_id,
                    outcome_id: position.outcome_id,
                    tx_type: TransactionType::SettlementPayout,
                    shares: position.shares_owned,
                    price_per_share: Decimal::ONE,
                    total_amount: payout,
                    fees: Decimal::ZERO,
                    balance_change: payout,
                    created_at: Utc::now(),
                });
            }
            position.settle(payout);
            builder.upsert_position(position);
            settled_positions += 1;
        }

        let mut market = state.market.clone();
        market.status = MarketStatus::Settled;
        market.winning_outcome_id = Some(winning_outcome_id);
        market.updated_at = Utc::now();
        builder.set_market(market);

        let receipt = SettlementReceipt {
            market_id,
            winning_outcome_id,
            settled_positions,
            winners_count,
            total_payout,
            settled_at: Utc::now(),
        };
        builder.set_settlement_receipt(receipt.clone());

        self.ledger.apply_atomically(builder.build()).await?;

        info!(
            market_id = %market_id,
            settled = receipt.settled_positions,
            winners = receipt.winners_count,
            payout = %receipt.total_payout,
            "market settled"
        );
        Ok(receipt)
    }
}

/// Infer the winning outcome from a "home-away" score string.
///
/// Advisory UI convenience only; never authoritative for money
/// movement. Outcomes are expected in fixture order: home win, (draw,)
/// away win.
pub fn suggest_winner(final_score: &str, outcomes: &[Outcome]) -> Option<OutcomeId> {
    let (home, away) = final_score.split_once('-')?;
    let home: i32 = home.trim().parse().ok()?;
    let away: i32 = away.trim().parse().ok()?;

    let idx = match (outcomes.len(), home.cmp(&away)) {
        (2 | 3, std::cmp::Ordering::Greater) => 0,
        (3, std::cmp::Ordering::Equal) => 1,
        (2, std::cmp::Ordering::Less) => 1,
        (3, std::cmp::Ordering::Less) => 2,
        _ => {
            warn!(final_score, "no winner inferable from score");
            return None;
        }
    };
    outcomes.get(idx).map(|o| o.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn outcome(label: &str) -> Outcome {
        Outcome {
            id: Uuid::new_v4(),
            market_id: Uuid::new_v4(),
            label: label.to_string(),
            total_shares: dec!(10000),
            reserve: dec!(10000),
            current_price: dec!(0.50),
            volume_24h: Decimal::ZERO,
        }
    }

    #[test]
    fn test_suggest_winner_three_outcomes() {
        let outcomes = vec![outcome("Home"), outcome("Draw"), outcome("Away")];
        assert_eq!(suggest_winner("2-1", &outcomes), Some(outcomes[0].id));
        assert_eq!(suggest_winner("1-1", &outcomes), Some(outcomes[1].id));
        assert_eq!(suggest_winner("0-3", &outcomes), Some(outcomes[2].id));
    }

    #[test]
    fn test_suggest_winner_two_outcomes_rejects_draw() {
        let outcomes = vec![outcome("Home"), outcome("Away")];
        assert_eq!(suggest_winner("1-0", &outcomes), Some(outcomes[0].id));
        assert_eq!(suggest_winner("2-2", &outcomes), None);
    }

    #[test]
    fn test_suggest_winner_unparseable_score() {
        let outcomes = vec![outcome("Home"), outcome("Away")];
        assert_eq!(suggest_winner("abandoned", &outcomes), None);
        assert_eq!(suggest_winner("2:1", &outcomes), None);
    }
}
