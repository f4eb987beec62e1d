//! Property Tests - AMM, Book, and Fixed-Point Invariants
//!
//! Randomized checks of the algebraic guarantees the engines rely on:
//! the price band, buy/sell price monotonicity, reserve conservation,
//! fee bounds, rounding idempotence, and book priority ordering.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use outcome_exchange::domain::amm::AmmPool;
use outcome_exchange::domain::book::OrderBook;
use outcome_exchange::domain::fixed;
use outcome_exchange::domain::market::{TradeOrder, TradeSide};

fn pool(reserve_cents: i64, shares_e4: i64, fee_bps: i64) -> AmmPool {
    let reserve = Decimal::new(reserve_cents, 2);
    let total_shares = Decimal::new(shares_e4, 4);
    AmmPool {
        outcome_id: Uuid::new_v4(),
        reserve,
        total_shares,
        current_price: fixed::clamp_price(reserve / total_shares),
        k_constant: reserve,
        fee_rate: Decimal::new(fee_bps, 4),
    }
}

proptest! {
    #[test]
    fn buy_keeps_price_in_band_and_never_lowers_it(
        reserve_cents in 100_000i64..100_000_000,
        shares_e4 in 10_000_000i64..10_000_000_000,
        amount_cents in 100i64..1_000_000,
        fee_bps in 0i64..300,
    ) {
        let p = pool(reserve_cents, shares_e4, fee_bps);
        let amount = Decimal::new(amount_cents, 2);
        if let Ok(q) = p.quote(TradeSide::Buy, amount) {
            prop_assert!(q.new_price >= fixed::MIN_PRICE);
            prop_assert!(q.new_price <= fixed::MAX_PRICE);
            prop_assert!(q.new_price >= p.current_price);
            prop_assert!(q.shares_or_cost > Decimal::ZERO);
        }
    }

    #[test]
    fn sell_keeps_price_in_band_and_never_raises_it(
        reserve_cents in 100_000i64..100_000_000,
        shares_e4 in 10_000_000i64..10_000_000_000,
        sell_e4 in 10_000i64..100_000_000,
        fee_bps in 0i64..300,
    ) {
        let p = pool(reserve_cents, shares_e4, fee_bps);
        let shares = Decimal::new(sell_e4, 4);
        if let Ok(q) = p.quote(TradeSide::Sell, shares) {
            prop_assert!(q.new_price >= fixed::MIN_PRICE);
            prop_assert!(q.new_price <= fixed::MAX_PRICE);
            prop_assert!(q.new_price <= p.current_price);
            prop_assert!(q.shares_or_cost > Decimal::ZERO);
        }
    }

    #[test]
    fn buy_conserves_reserve_and_bounds_fees(
        reserve_cents in 100_000i64..100_000_000,
        shares_e4 in 10_000_000i64..10_000_000_000,
        amount_cents in 100i64..1_000_000,
        fee_bps in 0i64..300,
    ) {
        let p = pool(reserve_cents, shares_e4, fee_bps);
        let amount = Decimal::new(amount_cents, 2);
        if let Ok(q) = p.quote(TradeSide::Buy, amount) {
            // The reserve absorbs exactly the net input.
            prop_assert_eq!(q.new_reserve, p.reserve + amount - q.fees);
            prop_assert_eq!(q.fees, fixed::round_currency(amount * p.fee_rate));
            prop_assert!(q.fees < amount);
        }
    }

    #[test]
    fn sell_pays_out_no_more_than_the_reserve(
        reserve_cents in 100_000i64..100_000_000,
        shares_e4 in 10_000_000i64..10_000_000_000,
        sell_e4 in 10_000i64..100_000_000,
        fee_bps in 0i64..300,
    ) {
        let p = pool(reserve_cents, shares_e4, fee_bps);
        let shares = Decimal::new(sell_e4, 4);
        if let Ok(q) = p.quote(TradeSide::Sell, shares) {
            prop_assert!(q.new_reserve > Decimal::ZERO);
            prop_assert!(q.shares_or_cost + q.fees + q.new_reserve == p.reserve);
            prop_assert!(q.new_total_shares == fixed::round_shares(p.total_shares + shares));
        }
    }

    #[test]
    fn currency_rounding_is_idempotent(cents in -1_000_000_000i64..1_000_000_000, scale in 0u32..10) {
        let x = Decimal::new(cents, scale);
        let once = fixed::round_currency(x);
        prop_assert_eq!(fixed::round_currency(once), once);
        prop_assert!((once - x).abs() <= dec!(0.005));
    }

    #[test]
    fn share_rounding_is_idempotent(raw in -1_000_000_000i64..1_000_000_000, scale in 0u32..15) {
        let x = Decimal::new(raw, scale);
        let once = fixed::round_shares(x);
        prop_assert_eq!(fixed::round_shares(once), once);
    }

    #[test]
    fn clamped_price_always_lands_in_band(raw in -1_000_000i64..10_000_000, scale in 0u32..8) {
        let p = fixed::clamp_price(Decimal::new(raw, scale));
        prop_assert!(p >= fixed::MIN_PRICE);
        prop_assert!(p <= fixed::MAX_PRICE);
    }

    #[test]
    fn ask_priority_is_sorted_ascending(prices in prop::collection::vec(1i64..99, 1..20)) {
        let market_id = Uuid::new_v4();
        let outcome_id = Uuid::new_v4();
        let orders: Vec<TradeOrder> = prices
            .iter()
            .map(|&cents| {
                TradeOrder::new_limit(
                    Uuid::new_v4(),
                    market_id,
                    outcome_id,
                    TradeSide::Sell,
                    dec!(10),
                    Decimal::new(cents, 2),
                )
            })
            .collect();
        let book = OrderBook::from_orders(&orders);
        let queue = book.priority(TradeSide::Buy);
        prop_assert_eq!(queue.len(), orders.len());
        for pair in queue.windows(2) {
            prop_assert!(pair[0].price <= pair[1].price);
        }
    }
}
