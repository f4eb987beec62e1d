//! Per-Market Serialization Locks
//!
//! Matching and settlement against one market must be serialized; the
//! k ≈ reserve invariant and price-time ordering are unsafe under
//! concurrent unserialized writes. Distinct markets proceed fully in
//! parallel. Acquisition waits a bounded time and yields the retryable
//! `Busy` error instead of deadlocking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::error::EngineError;
use crate::domain::market::MarketId;

/// Registry of one async mutex per market.
pub struct MarketLocks {
    timeout: Duration,
    registry: Mutex<HashMap<MarketId, Arc<Mutex<()>>>>,
}

impl MarketLocks {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for a market, waiting at most the configured
    /// timeout. Times out with [`EngineError::Busy`].
    pub async fn acquire(&self, market_id: MarketId) -> Result<OwnedMutexGuard<()>, EngineError> {
        let lock = {
            let mut registry = self.registry.lock().await;
            Arc::clone(
                registry
                    .entry(market_id)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        tokio::time::timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| EngineError::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_same_market_serializes() {
        let locks = MarketLocks::new(50);
        let market = Uuid::new_v4();

        let guard = locks.acquire(market).await.unwrap();
        let err = locks.acquire(market).await.unwrap_err();
        assert_eq!(err, EngineError::Busy);

        drop(guard);
        assert!(locks.acquire(market).await.is_ok());
    }

    #[tokio::test]
    async fn test_distinct_markets_parallel() {
        let locks = MarketLocks::new(50);
        let _a = locks.acquire(Uuid::new_v4()).await.unwrap();
        let _b = locks.acquire(Uuid::new_v4()).await.unwrap();
    }
}
