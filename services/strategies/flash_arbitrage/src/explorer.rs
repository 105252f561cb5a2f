//! # Route Explorer - Bounded Multi-Hop Loop Search
//!
//! ## Purpose
//!
//! Finds the most profitable closed loop `base → t1 → … → base` reachable in at
//! most `max_hops` swaps. Every hop is priced through the quote aggregator at
//! the exact amount flowing into it, so a loop's output already reflects price
//! impact along the path.
//!
//! ## Search
//!
//! Depth-first from `base`. Each branch owns its own copy of the visited set
//! and hop list, so sibling branches are independent and are explored
//! concurrently. A branch is pruned when the depth budget is spent, when the
//! next token was already visited, or when no venue quotes the hop. Loops are
//! collected in candidate order, which makes the tie-break deterministic: the
//! first loop found wins among equal profits.
//!
//! ## Profit
//!
//! ```text
//! gas_cost   = gas_price × (base_gas + Σ hop.estimated_gas)   (wei)
//! gas_base   = gas_cost converted to base-token units
//! net_profit = final_out − amount_in − gas_base
//! ```
//!
//! A loop is accepted only when `net_profit > min_profit` and strictly beats
//! the best so far.

use ethers::types::{Address, U256};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};
use types::{format_amount, Hop, Route};

use crate::gas_price::GasOracle;
use crate::quoting::QuoteSource;

#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Profit floor in base-token units; routes must exceed it
    pub min_profit: U256,
    /// Fixed executor overhead added to the per-hop gas estimates
    pub base_gas: u64,
    pub wrapped_native: Address,
}

/// Gas cost in wei expressed in `base` units; identity for the wrapped native
/// token, otherwise priced through a `wrapped_native → base` quote
pub async fn convert_gas_cost(
    quotes: &dyn QuoteSource,
    wrapped_native: Address,
    base: Address,
    gas_wei: U256,
) -> Option<U256> {
    if base == wrapped_native || gas_wei.is_zero() {
        return Some(gas_wei);
    }
    quotes
        .best_quote(wrapped_native, base, gas_wei)
        .await
        .map(|quote| quote.amount_out)
}

pub struct RouteExplorer {
    quotes: Arc<dyn QuoteSource>,
    gas: Arc<dyn GasOracle>,
    config: ExplorerConfig,
}

impl RouteExplorer {
    pub fn new(quotes: Arc<dyn QuoteSource>, gas: Arc<dyn GasOracle>, config: ExplorerConfig) -> Self {
        Self { quotes, gas, config }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Most profitable closed loop at `base`, or `None`
    pub async fn find_best_route(
        &self,
        base: Address,
        candidates: &[Address],
        amount_in: U256,
        max_hops: usize,
    ) -> Option<Route> {
        if amount_in.is_zero() || max_hops < 2 {
            return None;
        }

        let mut unique = Vec::with_capacity(candidates.len());
        for token in candidates {
            if *token != base && !unique.contains(token) {
                unique.push(*token);
            }
        }
        if unique.is_empty() {
            return None;
        }

        let gas_price = match self.gas.gas_price().await {
            Ok(price) => price,
            Err(e) => {
                debug!("No gas price for route search: {}", e);
                return None;
            }
        };

        let mut visited = HashSet::new();
        visited.insert(base);
        let loops = self
            .explore(base, &unique, base, amount_in, Vec::new(), visited, max_hops)
            .await;
        trace!("{} closed loops at {:?}", loops.len(), base);

        let mut best: Option<Route> = None;
        for hops in loops {
            let Some(route) = self.evaluate(base, hops, gas_price).await else {
                continue;
            };
            if route.net_profit <= self.config.min_profit {
                continue;
            }
            if best
                .as_ref()
                .map_or(true, |current| route.net_profit > current.net_profit)
            {
                best = Some(route);
            }
        }

        if let Some(route) = &best {
            debug!(
                "Best loop at {:?}: {} hops, net {}",
                base,
                route.hops.len(),
                format_amount(route.net_profit, 18)
            );
        }
        best
    }

    async fn evaluate(&self, base: Address, hops: Vec<Hop>, gas_price: U256) -> Option<Route> {
        let units = hops
            .iter()
            .fold(self.config.base_gas, |acc, hop| acc.saturating_add(hop.estimated_gas));
        let gas_wei = gas_price.saturating_mul(U256::from(units));
        let gas_cost =
            convert_gas_cost(self.quotes.as_ref(), self.config.wrapped_native, base, gas_wei).await?;
        Route::new(base, hops, gas_cost).ok()
    }

    /// Closed loops reachable from `token` holding `amount`, in candidate order
    #[allow(clippy::too_many_arguments)]
    fn explore<'a>(
        &'a self,
        base: Address,
        candidates: &'a [Address],
        token: Address,
        amount: U256,
        hops: Vec<Hop>,
        visited: HashSet<Address>,
        max_hops: usize,
    ) -> BoxFuture<'a, Vec<Vec<Hop>>> {
        async move {
            let depth = hops.len();
            let mut loops = Vec::new();

            if depth >= 1 {
                if let Some(quote) = self.quotes.best_quote(token, base, amount).await {
                    let mut closed = hops.clone();
                    closed.push(quote.into_hop(token, base));
                    loops.push(closed);
                }
            }

            // Extending needs room for the new hop plus the closing hop
            if depth + 2 > max_hops {
                return loops;
            }

            let branches = candidates
                .iter()
                .copied()
                .filter(|next| !visited.contains(next))
                .map(|next| {
                    let mut hops = hops.clone();
                    let mut visited = visited.clone();
                    async move {
                        let quote = self.quotes.best_quote(token, next, amount).await?;
                        let out = quote.amount_out;
                        hops.push(quote.into_hop(token, next));
                        visited.insert(next);
                        Some(
                            self.explore(base, candidates, next, out, hops, visited, max_hops)
                                .await,
                        )
                    }
                });

            for found in join_all(branches).await.into_iter().flatten() {
                loops.extend(found);
            }
            loops
        }
        .boxed()
    }
}
