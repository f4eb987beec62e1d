//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Interfaces the core requires from the outside world. Adapters
//! implement these traits; the use cases only ever see the trait.
//!
//! Port categories:
//! - `MarketRepository`: ACID persistence behind the ledger

pub mod repository;

pub use repository::{
    BalanceChange, LedgerEffects, LedgerReceipt, MarketRepository,
};
