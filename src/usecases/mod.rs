//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with the repository port to implement the
//! exchange's core workflows. Each use case is a self-contained
//! business operation.
//!
//! Use cases:
//! - `MatchEngine`: order validation, book + AMM matching, cancellation
//! - `LedgerWriter`: atomic multi-entity commit of trade effects
//! - `SettlementEngine`: market close and terminal settlement
//! - `MarketLocks`: per-market serialization with bounded waits

pub mod ledger;
pub mod locks;
pub mod match_engine;
pub mod settlement;

pub use ledger::{EffectsBuilder, LedgerWriter};
pub use locks::MarketLocks;
pub use match_engine::{
    CancelOutcome, EstimatedTrade, MatchEngine, OrderRequest, OrderResponse, TradeExecution,
    UnfilledPolicy,
};
pub use settlement::{suggest_winner, SettlementEngine};
