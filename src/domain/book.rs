//! Resting limit-order book for one outcome.
//!
//! Price levels are `BTreeMap` keys with FIFO queues inside each level,
//! giving price-time priority for free: an incoming buy walks asks from
//! the cheapest level up, oldest order first; an incoming sell walks
//! bids from the best level down.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::market::{OrderId, TradeOrder, TradeSide, UserId};

/// One resting order as seen by the matching walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub price: Decimal,
    pub remaining_shares: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Aggregated depth per price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub shares: Decimal,
}

/// Post-trade observable snapshot of the book, for external relays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    /// Bid levels, best (highest) first.
    pub bids: Vec<DepthLevel>,
    /// Ask levels, best (lowest) first.
    pub asks: Vec<DepthLevel>,
}

/// In-memory view of the resting orders for one outcome.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    bids: BTreeMap<Decimal, VecDeque<BookEntry>>,
    asks: BTreeMap<Decimal, VecDeque<BookEntry>>,
}

impl OrderBook {
    /// Build a book from persisted resting orders.
    ///
    /// Orders without a price limit cannot rest and are skipped with a
    /// logged correction.
    pub fn from_orders(orders: &[TradeOrder]) -> Self {
        let mut book = Self::default();
        let mut sorted: Vec<&TradeOrder> = orders
            .iter()
            .filter(|o| !o.status.is_terminal() && o.remaining_shares() > Decimal::ZERO)
            .collect();
        sorted.sort_by_key(|o| o.created_at);
        for order in sorted {
            let Some(price) = order.price_limit else {
                warn!(order_id = %order.id, "resting order without price limit skipped");
                continue;
            };
            book.insert(BookEntry {
                order_id: order.id,
                user_id: order.user_id,
                price,
                remaining_shares: order.remaining_shares(),
                created_at: order.created_at,
            }, order.side);
        }
        book
    }

    /// Insert a resting entry at its price level (time priority within
    /// the level follows insertion order).
    pub fn insert(&mut self, entry: BookEntry, side: TradeSide) {
        self.levels_mut(side)
            .entry(entry.price)
            .or_default()
            .push_back(entry);
    }

    /// Resting entries a taker of `taker_side` would match, in strict
    /// price-time priority order.
    pub fn priority(&self, taker_side: TradeSide) -> Vec<BookEntry> {
        match taker_side {
            // Incoming buy lifts asks, cheapest first.
            TradeSide::Buy => self
                .asks
                .values()
                .flat_map(|level| level.iter().cloned())
                .collect(),
            // Incoming sell hits bids, highest first.
            TradeSide::Sell => self
                .bids
                .values()
                .rev()
                .flat_map(|level| level.iter().cloned())
                .collect(),
        }
    }

    /// Reduce a resting entry by `shares`, dropping it (and an emptied
    /// level) once exhausted. Returns false if the entry is unknown.
    pub fn apply_fill(
        &mut self,
        side: TradeSide,
        price: Decimal,
        order_id: OrderId,
        shares: Decimal,
    ) -> bool {
        let levels = self.levels_mut(side);
        let Some(level) = levels.get_mut(&price) else {
            return false;
        };
        let Some(idx) = level.iter().position(|e| e.order_id == order_id) else {
            return false;
        };
        level[idx].remaining_shares -= shares;
        if level[idx].remaining_shares <= Decimal::ZERO {
            level.remove(idx);
        }
        if level.is_empty() {
            levels.remove(&price);
        }
        true
    }

    /// Remove a resting entry outright (cancellation).
    pub fn remove(&mut self, side: TradeSide, price: Decimal, order_id: OrderId) -> bool {
        let levels = self.levels_mut(side);
        let Some(level) = levels.get_mut(&price) else {
            return false;
        };
        let before = level.len();
        level.retain(|e| e.order_id != order_id);
        let removed = level.len() < before;
        if level.is_empty() {
            levels.remove(&price);
        }
        removed
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Aggregate depth snapshot, best levels first on both sides.
    pub fn depth(&self) -> DepthSnapshot {
        let sum = |level: &VecDeque<BookEntry>| {
            level
                .iter()
                .map(|e| e.remaining_shares)
                .sum::<Decimal>()
        };
        DepthSnapshot {
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            bids: self
                .bids
                .iter()
                .rev()
                .map(|(price, level)| DepthLevel { price: *price, shares: sum(level) })
                .collect(),
            asks: self
                .asks
                .iter()
                .map(|(price, level)| DepthLevel { price: *price, shares: sum(level) })
                .collect(),
        }
    }

    fn levels_mut(&mut self, side: TradeSide) -> &mut BTreeMap<Decimal, VecDeque<BookEntry>> {
        match side {
            TradeSide::Buy => &mut self.bids,
            TradeSide::Sell => &mut self.asks,
        }
    }
}
