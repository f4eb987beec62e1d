//! Domain layer - Core trading logic and models.
//!
//! Pure business logic for the hybrid book + AMM exchange core. No I/O
//! here (hexagonal architecture inner ring); everything is serializable
//! and testable in isolation.

pub mod amm;
pub mod book;
pub mod error;
pub mod fixed;
pub mod market;

// Re-export core types for convenience
pub use amm::{AmmPool, AmmQuote};
pub use book::{BookEntry, DepthSnapshot, OrderBook};
pub use error::{EngineError, LedgerError};
pub use market::{
    LiquidityPool, Market, MarketState, MarketStatus, Outcome, OrderStatus, OrderType, Position,
    SettlementReceipt, TradeOrder, TradeSide, Transaction, TransactionType,
};
