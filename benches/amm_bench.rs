//! AMM and Book Benchmarks - Trade Hot-Path Performance
//!
//! Benchmarks the pure domain functions that run on every order:
//! pool quoting, rounding, and the priority walk over a loaded book.
//!
//! Run with: cargo bench --bench amm_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use outcome_exchange::domain::amm::AmmPool;
use outcome_exchange::domain::book::OrderBook;
use outcome_exchange::domain::fixed;
use outcome_exchange::domain::market::{TradeOrder, TradeSide};

fn pool() -> AmmPool {
    AmmPool {
        outcome_id: Uuid::new_v4(),
        reserve: dec!(10000),
        total_shares: dec!(20000),
        current_price: dec!(0.50),
        k_constant: dec!(10000),
        fee_rate: dec!(0.02),
    }
}

/// Benchmark a buy quote against the pool.
fn bench_quote_buy(c: &mut Criterion) {
    let p = pool();

    c.bench_function("amm_quote_buy", |b| {
        b.iter(|| {
            let _quote = p.quote(TradeSide::Buy, black_box(dec!(250)));
        });
    });
}

/// Benchmark a sell quote against the pool.
fn bench_quote_sell(c: &mut Criterion) {
    let p = pool();

    c.bench_function("amm_quote_sell", |b| {
        b.iter(|| {
            let _quote = p.quote(TradeSide::Sell, black_box(dec!(500)));
        });
    });
}

/// Benchmark the invariant check that gates every trade.
fn bench_validate(c: &mut Criterion) {
    let p = pool();

    c.bench_function("amm_validate_drift", |b| {
        b.iter(|| {
            let _ok = p.validate(black_box(dec!(0.10)));
        });
    });
}

/// Benchmark the priority walk over a 100-order book.
fn bench_book_priority(c: &mut Criterion) {
    let market_id = Uuid::new_v4();
    let outcome_id = Uuid::new_v4();
    let orders: Vec<TradeOrder> = (0..100)
        .map(|i| {
            TradeOrder::new_limit(
                Uuid::new_v4(),
                market_id,
                outcome_id,
                TradeSide::Sell,
                dec!(10),
                Decimal::new(30 + i64::from(i % 40), 2),
            )
        })
        .collect();
    let book = OrderBook::from_orders(&orders);

    c.bench_function("book_priority_100_orders", |b| {
        b.iter(|| {
            let _queue = book.priority(black_box(TradeSide::Buy));
        });
    });
}

/// Benchmark fixed-point rounding of a trade result.
fn bench_rounding(c: &mut Criterion) {
    let raw = dec!(909.0909090909090909);

    c.bench_function("round_shares", |b| {
        b.iter(|| {
            let _r = fixed::round_shares(black_box(raw));
        });
    });
}

criterion_group!(
    benches,
    bench_quote_buy,
    bench_quote_sell,
    bench_validate,
    bench_book_priority,
    bench_rounding
);
criterion_main!(benches);
