//! # Gas Price Fetching - Cached Gas Cost Estimation
//!
//! ## Purpose
//!
//! Current gas price for profit calculations without an RPC round trip per
//! route. The fetcher caches `eth_gasPrice` for a TTL, accepts pushed updates
//! (e.g. base fees from `newHeads`) and falls back to a configured default when
//! the node cannot be reached. Estimates tolerate both; the price a transaction
//! is signed at comes from [`GasOracle::current_gas_price`], which does not.
//!
//! ## Integration Points
//!
//! - **Input Sources**: [`ChainClient::gas_price`], pushed block-header fees
//! - **Output Destinations**: route explorer gas costs, pipeline validation
//!
//! ## Architecture Role
//!
//! ```text
//! Node RPC → [GasPriceFetcher cache] → [GasOracle] → Explorer / Pipeline
//!              TTL + fallback             trait        gas_price × gas units
//! ```

use async_trait::async_trait;
use ethers::types::U256;
use network::{with_retry, ChainClient, RetryPolicy};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use types::EngineResult;

/// Source of the current gas price in wei
#[async_trait]
pub trait GasOracle: Send + Sync {
    /// Price for estimates; may be cached or a fallback
    async fn gas_price(&self) -> EngineResult<U256>;

    /// Price reported by the node right now, for signing
    async fn current_gas_price(&self) -> EngineResult<U256> {
        self.gas_price().await
    }
}

/// Constant gas price, for dry runs and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedGasPrice(pub U256);

#[async_trait]
impl GasOracle for FixedGasPrice {
    async fn gas_price(&self) -> EngineResult<U256> {
        Ok(self.0)
    }
}

/// Cached gas price information
#[derive(Debug, Clone, Copy)]
struct GasPriceCache {
    gas_price_wei: U256,
    fetched_at: Instant,
}

impl GasPriceCache {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// Gas price fetcher with TTL caching
pub struct GasPriceFetcher {
    client: Arc<dyn ChainClient>,
    cache: RwLock<Option<GasPriceCache>>,
    ttl: Duration,
    fallback_wei: U256,
    retry: RetryPolicy,
}

impl GasPriceFetcher {
    pub fn new(client: Arc<dyn ChainClient>, ttl: Duration, fallback_wei: U256) -> Self {
        Self {
            client,
            cache: RwLock::new(None),
            ttl,
            fallback_wei,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(200),
                max_delay: Duration::from_secs(1),
                jitter: true,
            },
        }
    }

    /// Current gas price in wei; never fails, falls back to the default
    pub async fn get_gas_price_wei(&self) -> U256 {
        if let Some(cached) = self.cached() {
            debug!("Using cached gas price: {} wei", cached);
            return cached;
        }

        match self.fetch().await {
            Ok(gas_price) => gas_price,
            Err(e) => {
                warn!("Failed to fetch gas price, using default: {}", e);
                self.fallback_wei
            }
        }
    }

    /// Bypass the cache; errors propagate instead of falling back
    pub async fn fetch(&self) -> EngineResult<U256> {
        let gas_price = with_retry(&self.retry, "eth_gasPrice", |_| self.client.gas_price()).await?;
        self.update(gas_price);
        debug!(
            "⛽ Fetched fresh gas price: {} wei ({} gwei)",
            gas_price,
            gas_price / U256::exp10(9)
        );
        Ok(gas_price)
    }

    /// Unexpired cached value
    pub fn cached(&self) -> Option<U256> {
        let entry = *self.cache.read();
        entry
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.gas_price_wei)
    }

    /// Store a pushed price, e.g. from a new block header
    pub fn update(&self, gas_price_wei: U256) {
        *self.cache.write() = Some(GasPriceCache {
            gas_price_wei,
            fetched_at: Instant::now(),
        });
    }

    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    /// Cost of `gas_units` at the current price, in wei
    pub async fn transaction_cost_wei(&self, gas_units: u64) -> U256 {
        self.get_gas_price_wei()
            .await
            .saturating_mul(U256::from(gas_units))
    }
}

#[async_trait]
impl GasOracle for GasPriceFetcher {
    async fn gas_price(&self) -> EngineResult<U256> {
        Ok(self.get_gas_price_wei().await)
    }

    async fn current_gas_price(&self) -> EngineResult<U256> {
        self.fetch().await
    }
}
