//! Outcome Exchange - Library Root
//!
//! Trading core for sports outcome share markets: a resting limit-order
//! book blended with a per-outcome constant-product AMM, settled to
//! $1/share once the match result is known.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
