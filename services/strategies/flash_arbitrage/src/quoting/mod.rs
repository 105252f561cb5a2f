//! # Quote Aggregator - Concurrent Cross-DEX Pricing
//!
//! ## Purpose
//!
//! Best executable output for a `(token_in, token_out, amount_in)` triple
//! across every registered venue. One query per [`DexQuoter`] runs
//! concurrently, bounded by a semaphore and a per-query deadline. A venue that
//! errors, reverts or times out simply contributes no quote; one broken
//! adapter never aborts the aggregate.
//!
//! ## Selection
//!
//! Strictly greatest `amount_out` wins, ties go to the adapter registered
//! first, and a zero output is never selected. Fan-out completes in any order;
//! selection runs over registration order so results are reproducible.
//!
//! ## Architecture Role
//!
//! ```text
//! Route Explorer → [QuoteAggregator] → DexQuoter × N → ChainClient (eth_call)
//!                   semaphore + deadline   V2 router / pair, V3 quoter / pool
//! ```

pub mod adapters;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, trace};
use types::{DexKind, EngineResult, Quote};

pub use adapters::{build_quoters, V2PairQuoter, V2RouterQuoter, V3PoolQuoter, V3QuoterAdapter};

/// One venue's pricing adapter
#[async_trait]
pub trait DexQuoter: Send + Sync {
    fn dex(&self) -> DexKind;

    /// `Ok(None)` when the venue has no market for the pair
    async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> EngineResult<Option<Quote>>;
}

/// Anything that can price a single hop
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn best_quote(&self, token_in: Address, token_out: Address, amount_in: U256)
        -> Option<Quote>;
}

/// Highest positive output; earlier entries win ties
pub fn select_best<I>(quotes: I) -> Option<Quote>
where
    I: IntoIterator<Item = Quote>,
{
    quotes
        .into_iter()
        .filter(Quote::is_positive)
        .fold(None, |best: Option<Quote>, quote| match best {
            Some(current) if quote.amount_out <= current.amount_out => Some(current),
            _ => Some(quote),
        })
}

pub struct QuoteAggregator {
    adapters: Vec<Arc<dyn DexQuoter>>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl QuoteAggregator {
    pub fn new(max_in_flight: usize, timeout: Duration) -> Self {
        Self {
            adapters: Vec::new(),
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            timeout,
        }
    }

    /// Registration order is the tie-break order
    pub fn register(&mut self, adapter: Arc<dyn DexQuoter>) {
        self.adapters.push(adapter);
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn DexQuoter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    async fn query(
        &self,
        adapter: &Arc<dyn DexQuoter>,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Option<Quote> {
        let _permit = self.permits.acquire().await.ok()?;
        match timeout(self.timeout, adapter.quote(token_in, token_out, amount_in)).await {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => {
                trace!("{} quote {:?}->{:?} failed: {}", adapter.dex(), token_in, token_out, e);
                None
            }
            Err(_) => {
                debug!("{} quote timed out after {:?}", adapter.dex(), self.timeout);
                None
            }
        }
    }

    /// Every venue's quote, in registration order, failures omitted
    pub async fn all_quotes(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Vec<Quote> {
        if amount_in.is_zero() || token_in == token_out {
            return Vec::new();
        }
        let queries = self
            .adapters
            .iter()
            .map(|adapter| self.query(adapter, token_in, token_out, amount_in));
        join_all(queries).await.into_iter().flatten().collect()
    }
}

#[async_trait]
impl QuoteSource for QuoteAggregator {
    async fn best_quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Option<Quote> {
        select_best(self.all_quotes(token_in, token_out, amount_in).await)
    }
}
