//! Match Engine - Hybrid Book + AMM Order Execution
//!
//! Given an incoming order, matches against resting limit orders in
//! price-time priority first, routes any remainder to the outcome's
//! constant-product pool, and emits one aggregate execution plus one
//! atomic ledger batch. Optimistic conflicts restart matching from a
//! fresh read; the per-market lock serializes everything else.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::domain::amm::{AmmPool, AmmQuote};
use crate::domain::book::{BookEntry, DepthSnapshot, OrderBook};
use crate::domain::error::{EngineError, LedgerError};
use crate::domain::fixed;
use crate::domain::market::{
    LiquidityPool, MarketId, MarketState, OrderId, OrderStatus, OrderType, OutcomeId, Position,
    TradeOrder, TradeSide, Transaction, TransactionType, UserId,
};
use crate::ports::repository::{LedgerEffects, MarketRepository};

use super::ledger::{EffectsBuilder, LedgerWriter};
use super::locks::MarketLocks;

/// What to do with a market order the AMM cannot absorb and the book
/// did not touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfilledPolicy {
    /// Fail the order with `InsufficientLiquidity`.
    Reject,
    /// Queue it as a resting limit order at the current market price.
    Rest,
}

/// Incoming trade intent.
///
/// `amount` is notional currency for market buys and shares for
/// everything else (market sells, and limit orders of either side,
/// which also carry `price_limit`).
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,
    pub side: TradeSide,
    pub order_type: OrderType,
    pub amount: Decimal,
    pub price_limit: Option<Decimal>,
    pub unfilled_policy: UnfilledPolicy,
}

/// AMM-only preview of a trade, for UI quoting.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedTrade {
    pub shares: Decimal,
    pub cost: Decimal,
    pub price_impact: Decimal,
    pub fees: Decimal,
}

/// Aggregate result of one executed order.
#[derive(Debug, Clone)]
pub struct TradeExecution {
    pub order: TradeOrder,
    pub book_shares: Decimal,
    pub amm_shares: Decimal,
    pub total_shares: Decimal,
    /// Currency spent (buys) or net proceeds (sells).
    pub total_amount: Decimal,
    pub effective_price: Decimal,
    pub fees: Decimal,
    /// Outcome price after the trade.
    pub new_price: Decimal,
    /// Post-trade book snapshot for an external relay to publish.
    pub depth: DepthSnapshot,
}

/// Outcome of a submit call.
#[derive(Debug, Clone)]
pub struct OrderResponse {
    pub status: OrderStatus,
    pub execution: Option<TradeExecution>,
    /// Hint for queued orders; the core itself never estimates.
    pub estimated_wait: Option<std::time::Duration>,
}

/// Outcome of a cancel call.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub order: TradeOrder,
    /// Unexecuted notional freed for the caller to release holds on.
    pub released_amount: Decimal,
}

/// The order manager: validates, matches, commits.
pub struct MatchEngine<R: MarketRepository> {
    repo: Arc<R>,
    ledger: LedgerWriter<R>,
    locks: Arc<MarketLocks>,
    config: EngineConfig,
}

impl<R: MarketRepository> MatchEngine<R> {
    pub fn new(repo: Arc<R>, locks: Arc<MarketLocks>, config: EngineConfig) -> Self {
        let ledger = LedgerWriter::new(Arc::clone(&repo));
        Self {
            repo,
            ledger,
            locks,
            config,
        }
    }

    /// Preview a trade against the AMM without effects. Read-only and
    /// freely retryable.
    #[instrument(skip(self), fields(market_id = %market_id, outcome_id = %outcome_id))]
    pub async fn quote_trade(
        &self,
        market_id: MarketId,
        outcome_id: OutcomeId,
        side: TradeSide,
        amount: Decimal,
    ) -> Result<EstimatedTrade, EngineError> {
        let state = self.repo.market_state(market_id).await?;
        ensure_market_open(&state)?;
        let outcome = state
            .outcome(outcome_id)
            .ok_or(EngineError::OutcomeNotFound(outcome_id))?;
        let pool = AmmPool::from_state(outcome, &state.pool);
        let quote = pool.quote(side, amount)?;
        Ok(match side {
            TradeSide::Buy => EstimatedTrade {
                shares: quote.shares_or_cost,
                cost: amount,
                price_impact: quote.price_impact,
                fees: quote.fees,
            },
            TradeSide::Sell => EstimatedTrade {
                shares: amount,
                cost: quote.shares_or_cost,
                price_impact: quote.price_impact,
                fees: quote.fees,
            },
        })
    }

    /// Execute an order: book first, AMM fallback, one atomic commit.
    ///
    /// Retries matching from a fresh read on optimistic conflicts, up
    /// to the configured budget, then surfaces `Busy`.
    #[instrument(skip(self, request), fields(market_id = %request.market_id, side = %request.side))]
    pub async fn submit_order(
        &self,
        request: OrderRequest,
    ) -> Result<OrderResponse, EngineError> {
        validate_request(&request)?;
        let _guard = self.locks.acquire(request.market_id).await?;

        for attempt in 0..self.config.concurrency.max_retries {
            let state = self.repo.market_state(request.market_id).await?;
            ensure_market_open(&state)?;

            let (response, effects) = match request.side {
                TradeSide::Buy => self.execute_buy(&state, &request).await?,
                TradeSide::Sell => self.execute_sell(&state, &request).await?,
            };

            match self.ledger.apply_atomically(effects).await {
                Ok(receipt) => {
                    info!(
                        status = ?response.status,
                        version = receipt.new_version,
                        "order committed"
                    );
                    return Ok(response);
                }
                Err(LedgerError::ConcurrentModification { expected, found }) => {
                    warn!(attempt, expected, found, "optimistic conflict, rematching");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::Busy)
    }

    /// Cancel a resting order: compare-and-swap on status under the
    /// market lock. A completed concurrent fill yields `AlreadyFilled`;
    /// cancelling twice is a no-op.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<CancelOutcome, EngineError> {
        let probe = self.repo.order(order_id).await?;
        if probe.user_id != user_id {
            return Err(EngineError::Validation(
                "order does not belong to caller".into(),
            ));
        }

        let _guard = self.locks.acquire(probe.market_id).await?;
        // Re-read under the lock; a concurrent match may have finished it.
        let mut order = self.repo.order(order_id).await?;
        match order.status {
            OrderStatus::Filled => Err(EngineError::AlreadyFilled(order_id)),
            OrderStatus::Cancelled => Ok(CancelOutcome {
                order,
                released_amount: Decimal::ZERO,
            }),
            OrderStatus::Pending | OrderStatus::Partial => {
                let released = match (order.side, order.price_limit) {
                    (TradeSide::Buy, Some(limit)) => {
                        fixed::round_currency(order.remaining_shares() * limit)
                    }
                    _ => Decimal::ZERO,
                };
                order.status = OrderStatus::Cancelled;
                order.updated_at = chrono::Utc::now();

                let state = self.repo.market_state(order.market_id).await?;
                let mut builder = EffectsBuilder::new(order.market_id, state.version);
                builder.upsert_order(order.clone());
                self.ledger.apply_atomically(builder.build()).await?;

                info!(order_id = %order_id, released = %released, "order cancelled");
                Ok(CancelOutcome {
                    order,
                    released_amount: released,
                })
            }
        }
    }

    /// Re-anchor the pool constant to the current reserve of one
    /// outcome. The only repair path for invariant drift; idempotent.
    #[instrument(skip(self))]
    pub async fn rebalance_pool(
        &self,
        market_id: MarketId,
        outcome_id: OutcomeId,
    ) -> Result<LiquidityPool, EngineError> {
        let _guard = self.locks.acquire(market_id).await?;
        let state = self.repo.market_state(market_id).await?;
        let outcome = state
            .outcome(outcome_id)
            .ok_or(EngineError::OutcomeNotFound(outcome_id))?;

        let mut pool = state.pool.clone();
        pool.k_constant = outcome.reserve;

        let mut builder = EffectsBuilder::new(market_id, state.version);
        builder.set_pool(pool.clone());
        self.ledger.apply_atomically(builder.build()).await?;

        info!(
            market_id = %market_id,
            k_constant = %pool.k_constant,
            "pool rebalanced"
        );
        Ok(pool)
    }

    // ────────────────────────────────────────────
    // Matching internals
    // ────────────────────────────────────────────

    async fn execute_buy(
        &self,
        state: &MarketState,
        req: &OrderRequest,
    ) -> Result<(OrderResponse, LedgerEffects), EngineError> {
        let outcome = state
            .outcome(req.outcome_id)
            .ok_or(EngineError::OutcomeNotFound(req.outcome_id))?;
        let mut pool = AmmPool::from_state(outcome, &state.pool);
        pool.validate(self.config.pool.drift_tolerance)?;
        self.ensure_fee_sane(&state.pool)?;
        let fee_rate = state.pool.fee_rate;

        let mut order = match req.order_type {
            OrderType::Market => TradeOrder::new_market(
                req.user_id,
                req.market_id,
                req.outcome_id,
                TradeSide::Buy,
                req.amount,
            ),
            OrderType::Limit => {
                let Some(limit) = req.price_limit else {
                    return Err(EngineError::Validation("limit order needs a price".into()));
                };
                TradeOrder::new_limit(
                    req.user_id,
                    req.market_id,
                    req.outcome_id,
                    TradeSide::Buy,
                    req.amount,
                    limit,
                )
            }
        };

        let budget_total = order.total_amount;
        let available = self.repo.balance(req.user_id).await?;
        if available < budget_total {
            return Err(EngineError::InsufficientFunds {
                required: budget_total,
                available,
            });
        }

        let resting = self
            .repo
            .resting_orders(req.outcome_id, TradeSide::Sell, self.config.trading.max_book_depth)
            .await?;
        let mut book = OrderBook::from_orders(&resting);
        let queue = book.priority(TradeSide::Buy);

        let mut builder = EffectsBuilder::new(req.market_id, state.version);
        let mut budget = budget_total;
        let mut book_shares = Decimal::ZERO;
        let mut book_cost = Decimal::ZERO;
        let mut book_fees = Decimal::ZERO;

        for entry in queue {
            if budget < fixed::MIN_BUDGET {
                break;
            }
            if let Some(limit) = order.price_limit {
                if entry.price > limit {
                    break;
                }
            }
            if entry.user_id == req.user_id {
                debug!(order_id = %entry.order_id, "skipping self-match");
                continue;
            }

            let mut matchable = entry.remaining_shares.min(budget / entry.price);
            if order.order_type == OrderType::Limit {
                // Limit buys never execute beyond their requested shares.
                matchable = matchable.min(order.remaining_shares() - book_shares);
            }
            let mut shares = fixed::round_shares(matchable);
            let mut cost = fixed::round_currency(shares * entry.price);
            let mut fee = fixed::round_currency(cost * fee_rate);
            if cost + fee > budget {
                shares =
                    fixed::round_shares(budget / (entry.price * (Decimal::ONE + fee_rate)));
                cost = fixed::round_currency(shares * entry.price);
                fee = fixed::round_currency(cost * fee_rate);
                if cost + fee > budget {
                    break;
                }
            }
            if shares <= Decimal::ZERO || cost <= Decimal::ZERO {
                break;
            }

            self.fill_maker(&mut builder, &resting, &entry, TradeSide::Sell, shares, cost)
                .await?;
            book.apply_fill(TradeSide::Sell, entry.price, entry.order_id, shares);

            budget = fixed::round_currency(budget - cost - fee);
            book_shares = fixed::round_shares(book_shares + shares);
            book_cost = fixed::round_currency(book_cost + cost);
            book_fees = fixed::round_currency(book_fees + fee);
        }

        // AMM fallback for market orders; limit remainders rest instead.
        let mut amm_quote: Option<AmmQuote> = None;
        let mut rested = false;
        if budget >= fixed::MIN_BUDGET {
            match req.order_type {
                OrderType::Limit => rested = true,
                OrderType::Market => match pool.apply(TradeSide::Buy, budget) {
                    Ok(quote) => amm_quote = Some(quote),
                    Err(EngineError::InsufficientLiquidity { requested, suggested }) => {
                        if book_shares > Decimal::ZERO {
                            warn!(
                                remainder = %budget,
                                "AMM leg skipped, accepting book-only partial fill"
                            );
                        } else {
                            match req.unfilled_policy {
                                UnfilledPolicy::Reject => {
                                    return Err(EngineError::InsufficientLiquidity {
                                        requested,
                                        suggested,
                                    });
                                }
                                UnfilledPolicy::Rest => {
                                    order.order_type = OrderType::Limit;
                                    order.price_limit = Some(outcome.current_price);
                                    order.shares =
                                        fixed::round_shares(budget / outcome.current_price);
                                    rested = true;
                                }
                            }
                        }
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        let amm_shares = amm_quote.as_ref().map_or(Decimal::ZERO, |q| q.shares_or_cost);
        let amm_spent = amm_quote.as_ref().map_or(Decimal::ZERO, |q| q.amount_in);
        let amm_fees = amm_quote.as_ref().map_or(Decimal::ZERO, |q| q.fees);
        let total_shares = fixed::round_shares(book_shares + amm_shares);
        let total_spent = fixed::round_currency(book_cost + book_fees + amm_spent);
        let fees_total = fixed::round_currency(book_fees + amm_fees);

        let mut execution = None;
        if total_shares > Decimal::ZERO {
            order.apply_fill(total_shares, total_spent);

            let mut position = self
                .repo
                .position(req.user_id, req.outcome_id)
                .await?
                .unwrap_or_else(|| Position::new(req.user_id, req.market_id, req.outcome_id));
            position.apply_buy(total_shares, total_spent);
            builder.upsert_position(position);
            builder.balance_change(req.user_id, -total_spent);

            let effective_price = fixed::round_price(total_spent / total_shares);
            builder.record_transaction(transaction(
                req,
                TransactionType::Buy,
                total_shares,
                effective_price,
                total_spent,
                fees_total,
                -total_spent,
            ));

            let new_price = amm_quote
                .as_ref()
                .map_or(outcome.current_price, |q| q.new_price);
            execution = Some((effective_price, new_price));
        }

        if req.order_type == OrderType::Market && !rested {
            order.complete();
        }
        if rested && order.remaining_shares() > Decimal::ZERO {
            if let Some(limit) = order.price_limit {
                book.insert(
                    BookEntry {
                        order_id: order.id,
                        user_id: order.user_id,
                        price: limit,
                        remaining_shares: order.remaining_shares(),
                        created_at: order.created_at,
                    },
                    TradeSide::Buy,
                );
            }
        }

        self.write_market_rows(
            &mut builder,
            state,
            outcome.id,
            amm_quote.as_ref(),
            total_spent,
            fees_total,
        );
        builder.upsert_order(order.clone());

        let response = OrderResponse {
            status: order.status,
            execution: execution.map(|(effective_price, new_price)| TradeExecution {
                order: order.clone(),
                book_shares,
                amm_shares,
                total_shares,
                total_amount: total_spent,
                effective_price,
                fees: fees_total,
                new_price,
                depth: book.depth(),
            }),
            estimated_wait: None,
        };
        Ok((response, builder.build()))
    }

    async fn execute_sell(
        &self,
        state: &MarketState,
        req: &OrderRequest,
    ) -> Result<(OrderResponse, LedgerEffects), EngineError> {
        let outcome = state
            .outcome(req.outcome_id)
            .ok_or(EngineError::OutcomeNotFound(req.outcome_id))?;
        let mut pool = AmmPool::from_state(outcome, &state.pool);
        pool.validate(self.config.pool.drift_tolerance)?;
        self.ensure_fee_sane(&state.pool)?;
        let fee_rate = state.pool.fee_rate;

        let shares_requested = fixed::round_shares(req.amount);
        let mut taker_position = self
            .repo
            .position(req.user_id, req.outcome_id)
            .await?
            .ok_or(EngineError::InsufficientShares {
                required: shares_requested,
                available: Decimal::ZERO,
            })?;
        if !taker_position.is_active || taker_position.shares_owned < shares_requested {
            return Err(EngineError::InsufficientShares {
                required: shares_requested,
                available: taker_position.shares_owned,
            });
        }

        let mut order = match req.order_type {
            OrderType::Market => TradeOrder::new_market(
                req.user_id,
                req.market_id,
                req.outcome_id,
                TradeSide::Sell,
                shares_requested,
            ),
            OrderType::Limit => {
                let Some(limit) = req.price_limit else {
                    return Err(EngineError::Validation("limit order needs a price".into()));
                };
                TradeOrder::new_limit(
                    req.user_id,
                    req.market_id,
                    req.outcome_id,
                    TradeSide::Sell,
                    shares_requested,
                    limit,
                )
            }
        };

        let resting = self
            .repo
            .resting_orders(req.outcome_id, TradeSide::Buy, self.config.trading.max_book_depth)
            .await?;
        let mut book = OrderBook::from_orders(&resting);
        let queue = book.priority(TradeSide::Sell);

        let mut builder = EffectsBuilder::new(req.market_id, state.version);
        let mut remaining = shares_requested;
        let mut book_shares = Decimal::ZERO;
        let mut book_gross = Decimal::ZERO;
        let mut book_fees = Decimal::ZERO;
        let mut maker_debits: HashMap<UserId, Decimal> = HashMap::new();

        for entry in queue {
            if remaining <= Decimal::ZERO {
                break;
            }
            if let Some(limit) = order.price_limit {
                if entry.price < limit {
                    break;
                }
            }
            if entry.user_id == req.user_id {
                debug!(order_id = %entry.order_id, "skipping self-match");
                continue;
            }

            let shares = fixed::round_shares(entry.remaining_shares.min(remaining));
            let gross = fixed::round_currency(shares * entry.price);
            if shares <= Decimal::ZERO || gross <= Decimal::ZERO {
                break;
            }
            let fee = fixed::round_currency(gross * fee_rate);

            // A bid whose owner can no longer fund it must not abort the
            // taker's batch; skip it like a self-match.
            let debited = maker_debits
                .get(&entry.user_id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let maker_funds = self.repo.balance(entry.user_id).await?;
            if maker_funds - debited < gross {
                debug!(order_id = %entry.order_id, "skipping underfunded maker bid");
                continue;
            }
            *maker_debits.entry(entry.user_id).or_insert(Decimal::ZERO) += gross;

            self.fill_maker(&mut builder, &resting, &entry, TradeSide::Buy, shares, gross)
                .await?;
            book.apply_fill(TradeSide::Buy, entry.price, entry.order_id, shares);

            remaining = fixed::round_shares(remaining - shares);
            book_shares = fixed::round_shares(book_shares + shares);
            book_gross = fixed::round_currency(book_gross + gross);
            book_fees = fixed::round_currency(book_fees + fee);
        }

        let mut amm_quote: Option<AmmQuote> = None;
        let mut rested = false;
        if remaining > Decimal::ZERO {
            match req.order_type {
                OrderType::Limit => rested = true,
                OrderType::Market => match pool.apply(TradeSide::Sell, remaining) {
                    Ok(quote) => {
                        amm_quote = Some(quote);
                        remaining = Decimal::ZERO;
                    }
                    Err(EngineError::InsufficientLiquidity { requested, suggested }) => {
                        if book_shares > Decimal::ZERO {
                            warn!(
                                remainder = %remaining,
                                "AMM leg skipped, accepting book-only partial fill"
                            );
                        } else {
                            match req.unfilled_policy {
                                UnfilledPolicy::Reject => {
                                    return Err(EngineError::InsufficientLiquidity {
                                        requested,
                                        suggested,
                                    });
                                }
                                UnfilledPolicy::Rest => {
                                    // Rests at the current market price.
                                    order.order_type = OrderType::Limit;
                                    order.price_limit = Some(outcome.current_price);
                                    rested = true;
                                }
                            }
                        }
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        let amm_sold = amm_quote.as_ref().map_or(Decimal::ZERO, |q| q.amount_in);
        let amm_net = amm_quote.as_ref().map_or(Decimal::ZERO, |q| q.shares_or_cost);
        let amm_fees = amm_quote.as_ref().map_or(Decimal::ZERO, |q| q.fees);
        let total_sold = fixed::round_shares(book_shares + amm_sold);
        let book_net = fixed::round_currency(book_gross - book_fees);
        let total_net = fixed::round_currency(book_net + amm_net);
        let fees_total = fixed::round_currency(book_fees + amm_fees);
        let gross_notional =
            fixed::round_currency(book_gross + amm_net + amm_fees);

        let mut execution = None;
        if total_sold > Decimal::ZERO {
            order.apply_fill(total_sold, total_net);
            taker_position.apply_sell(total_sold, total_net);
            builder.upsert_position(taker_position);
            builder.balance_change(req.user_id, total_net);

            let effective_price = fixed::round_price(total_net / total_sold);
            builder.record_transaction(transaction(
                req,
                TransactionType::Sell,
                total_sold,
                effective_price,
                total_net,
                fees_total,
                total_net,
            ));

            let new_price = amm_quote
                .as_ref()
                .map_or(outcome.current_price, |q| q.new_price);
            execution = Some((effective_price, new_price));
        }

        if req.order_type == OrderType::Market && !rested {
            order.complete();
        }
        if rested && order.remaining_shares() > Decimal::ZERO {
            if let Some(limit) = order.price_limit {
                book.insert(
                    BookEntry {
                        order_id: order.id,
                        user_id: order.user_id,
                        price: limit,
                        remaining_shares: order.remaining_shares(),
                        created_at: order.created_at,
                    },
                    TradeSide::Sell,
                );
            }
        }

        self.write_market_rows(
            &mut builder,
            state,
            outcome.id,
            amm_quote.as_ref(),
            gross_notional,
            fees_total,
        );
        builder.upsert_order(order.clone());

        let response = OrderResponse {
            status: order.status,
            execution: execution.map(|(effective_price, new_price)| TradeExecution {
                order: order.clone(),
                book_shares,
                amm_shares: amm_sold,
                total_shares: total_sold,
                total_amount: total_net,
                effective_price,
                fees: fees_total,
                new_price,
                depth: book.depth(),
            }),
            estimated_wait: None,
        };
        Ok((response, builder.build()))
    }

    /// Reject trading on a pool row configured outside the fee ceiling.
    fn ensure_fee_sane(&self, pool: &LiquidityPool) -> Result<(), EngineError> {
        if pool.fee_rate < Decimal::ZERO || pool.fee_rate > self.config.pool.max_fee_rate {
            return Err(EngineError::Validation(format!(
                "pool fee rate {} outside [0, {}]",
                pool.fee_rate, self.config.pool.max_fee_rate
            )));
        }
        Ok(())
    }

    /// Apply one book match to the resting (maker) side: order fill,
    /// position, balance, and audit record.
    async fn fill_maker(
        &self,
        builder: &mut EffectsBuilder,
        resting: &[TradeOrder],
        entry: &BookEntry,
        maker_side: TradeSide,
        shares: Decimal,
        gross: Decimal,
    ) -> Result<(), EngineError> {
        let Some(maker_order) = resting.iter().find(|o| o.id == entry.order_id) else {
            return Err(EngineError::OrderNotFound(entry.order_id));
        };
        let mut maker_order = maker_order.clone();
        maker_order.apply_fill(shares, gross);

        let mut maker_position = self
            .repo
            .position(entry.user_id, maker_order.outcome_id)
            .await?
            .unwrap_or_else(|| {
                Position::new(entry.user_id, maker_order.market_id, maker_order.outcome_id)
            });
        let (tx_type, balance_delta) = match maker_side {
            // Maker sold shares to the taker: credit proceeds, realize pnl.
            TradeSide::Sell => {
                maker_position.apply_sell(shares, gross);
                (TransactionType::Sell, gross)
            }
            // Maker bought shares from the taker: debit cost.
            TradeSide::Buy => {
                maker_position.apply_buy(shares, gross);
                (TransactionType::Buy, -gross)
            }
        };

        builder.balance_change(entry.user_id, balance_delta);
        builder.upsert_position(maker_position);
        builder.record_transaction(Transaction {
            id: uuid::Uuid::new_v4(),
            user_id: entry.user_id,
            market_id: maker_order.market_id,
            outcome_id: maker_order.outcome_id,
            tx_type,
            shares,
            price_per_share: entry.price,
            total_amount: gross,
            fees: Decimal::ZERO,
            balance_change: balance_delta,
            created_at: chrono::Utc::now(),
        });
        builder.upsert_order(maker_order);
        Ok(())
    }

    /// Fold the AMM leg and fee accrual into outcome/pool row updates.
    fn write_market_rows(
        &self,
        builder: &mut EffectsBuilder,
        state: &MarketState,
        outcome_id: OutcomeId,
        amm_quote: Option<&AmmQuote>,
        traded_notional: Decimal,
        fees_total: Decimal,
    ) {
        if traded_notional <= Decimal::ZERO && amm_quote.is_none() {
            return;
        }
        if let Some(outcome) = state.outcome(outcome_id) {
            let mut outcome = outcome.clone();
            if let Some(quote) = amm_quote {
                outcome.reserve = quote.new_reserve;
                outcome.total_shares = quote.new_total_shares;
                outcome.current_price = quote.new_price;
            }
            outcome.volume_24h = fixed::round_currency(outcome.volume_24h + traded_notional);
            builder.upsert_outcome(outcome);
        }
        if fees_total > Decimal::ZERO {
            let mut pool = state.pool.clone();
            pool.available_liquidity =
                fixed::round_currency(pool.available_liquidity + fees_total);
            builder.set_pool(pool);
        }
    }
}

fn ensure_market_open(state: &MarketState) -> Result<(), EngineError> {
    if state.market.status.accepts_orders() {
        Ok(())
    } else {
        Err(EngineError::Validation(format!(
            "market {} is not accepting orders (status {:?})",
            state.market.id, state.market.status
        )))
    }
}

fn validate_request(req: &OrderRequest) -> Result<(), EngineError> {
    if req.amount <= Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "amount must be positive, got {}",
            req.amount
        )));
    }
    match req.order_type {
        OrderType::Limit => match req.price_limit {
            None => Err(EngineError::Validation("limit order needs a price".into())),
            Some(limit) if limit < fixed::MIN_PRICE || limit > fixed::MAX_PRICE => {
                Err(EngineError::Validation(format!(
                    "limit price {limit} outside [{}, {}]",
                    fixed::MIN_PRICE,
                    fixed::MAX_PRICE
                )))
            }
            Some(_) => Ok(()),
        },
        OrderType::Market => Ok(()),
    }
}

fn transaction(
    req: &OrderRequest,
    tx_type: TransactionType,
    shares: Decimal,
    price_per_share: Decimal,
    total_amount: Decimal,
    fees: Decimal,
    balance_change: Decimal,
) -> Transaction {
    Transaction {
        id: uuid::Uuid::new_v4(),
        user_id: req.user_id,
        market_id: req.market_id,
        outcome_id: req.outcome_id,
        tx_type,
        shares,
        price_per_share,
        total_amount,
        fees,
        balance_change,
        created_at: chrono::Utc::now(),
    }
}
