//! # Flash Arbitrage Strategy Engine - Coordination Hub
//!
//! ## Purpose
//!
//! Ties discovery to execution. Two triggers feed the same path:
//!
//! - **Periodic scan**: every `scan_interval`, each configured base token is
//!   searched for a closed loop over the configured candidates plus the
//!   current token universe
//! - **Pending swap**: a decoded mempool swap touching a base token triggers a
//!   targeted search over the tokens it trades, back-running the victim
//!
//! Pending swaps are always answered with a closed-loop back-run built from
//! `BundleSource::Route`. Mirroring the victim's own path
//! (`BundleSource::Swap`) has no quoted profit of its own, so the engine never
//! submits one.
//!
//! A found route becomes a bundle (with a flash-loan substitution when the
//! loan token differs from the route's base) and is driven through the
//! execution pipeline. Submitted bundles are settled in the background.
//!
//! ## Architecture Role
//!
//! ```text
//! ticker ──────┐
//!              ├→ [RouteExplorer] → [BundleOrchestrator] → [ExecutionPipeline] → relays
//! mempool ─────┘        ↑ quotes           flash loan          simulate/validate/submit
//! ```

use anyhow::Result;
use ethers::types::{Address, Bytes, U256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use types::{format_amount, EngineError, EngineResult, Route};

use network::unix_timestamp_secs;

use crate::events::{EngineEvent, EventSink};
use crate::explorer::RouteExplorer;
use crate::mempool::PendingSwap;
use crate::orchestrator::{BundleOrchestrator, BundleSource, FlashLoanSpec, Substitution};
use crate::pipeline::{ExecutionPipeline, ExecutionReport, ExecutionStage, Opportunity};
use crate::quoting::QuoteSource;
use crate::tokens::TokenFeed;
use crate::{log_profit, log_search};

/// Extra input borrowed when the loan token must be converted, to absorb the
/// round trip's fees
const SUBSTITUTION_BUFFER_BPS: u64 = 100;

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub base_tokens: Vec<Address>,
    pub candidate_tokens: Vec<Address>,
    pub trade_amount: U256,
    pub max_hops: usize,
    pub scan_interval: Duration,
    pub flash_loan_provider: Address,
    /// Borrow this token instead of each route's base token
    pub flash_loan_token: Option<Address>,
    pub wrapped_native: Address,
}

/// Configured candidates followed by feed tokens, without repeats
pub fn merge_candidates(configured: &[Address], feed: &[Address]) -> Vec<Address> {
    let mut merged = Vec::with_capacity(configured.len() + feed.len());
    for token in configured.iter().chain(feed) {
        if !merged.contains(token) {
            merged.push(*token);
        }
    }
    merged
}

/// First configured base token the pending swap sells or buys
pub fn select_base(base_tokens: &[Address], swap: &PendingSwap) -> Option<Address> {
    base_tokens
        .iter()
        .copied()
        .find(|base| *base == swap.decoded.token_in || *base == swap.decoded.token_out)
}

pub struct StrategyEngine {
    explorer: Arc<RouteExplorer>,
    orchestrator: Arc<BundleOrchestrator>,
    pipeline: Arc<ExecutionPipeline>,
    quotes: Arc<dyn QuoteSource>,
    token_feed: Option<Arc<TokenFeed>>,
    events: Arc<dyn EventSink>,
    next_id: AtomicU64,
    config: StrategyConfig,
}

impl StrategyEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        explorer: Arc<RouteExplorer>,
        orchestrator: Arc<BundleOrchestrator>,
        pipeline: Arc<ExecutionPipeline>,
        quotes: Arc<dyn QuoteSource>,
        token_feed: Option<Arc<TokenFeed>>,
        events: Arc<dyn EventSink>,
        config: StrategyConfig,
    ) -> Self {
        Self {
            explorer,
            orchestrator,
            pipeline,
            quotes,
            token_feed,
            events,
            next_id: AtomicU64::new(1),
            config,
        }
    }

    pub fn pipeline(&self) -> &Arc<ExecutionPipeline> {
        &self.pipeline
    }

    fn candidates(&self) -> Vec<Address> {
        let feed = self
            .token_feed
            .as_ref()
            .map(|feed| feed.addresses())
            .unwrap_or_default();
        merge_candidates(&self.config.candidate_tokens, &feed)
    }

    /// One search per base token; every route found is executed
    pub async fn scan_once(&self) -> Vec<ExecutionReport> {
        let candidates = self.candidates();
        let mut reports = Vec::new();
        for base in &self.config.base_tokens {
            let route = self
                .explorer
                .find_best_route(*base, &candidates, self.config.trade_amount, self.config.max_hops)
                .await;
            if let Some(route) = route {
                match self.execute_route(route, None).await {
                    Ok(report) => reports.push(report),
                    Err(e) => warn!("Route at {:?} not executable: {}", base, e),
                }
            }
        }
        reports
    }

    /// Targeted back-run search around a pending swap
    pub async fn handle_pending_swap(&self, swap: &PendingSwap) -> Option<ExecutionReport> {
        let base = select_base(&self.config.base_tokens, swap)?;
        let candidates = swap.decoded.counter_tokens(base);
        let route = self
            .explorer
            .find_best_route(base, &candidates, self.config.trade_amount, self.config.max_hops)
            .await?;
        match self.execute_route(route, Some(swap.raw.clone())).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Back-run of {:?} not executable: {}", swap.decoded.tx_hash, e);
                None
            }
        }
    }

    /// Build the bundle for a route and run it through the pipeline
    pub async fn execute_route(
        &self,
        route: Route,
        victim_tx: Option<Bytes>,
    ) -> EngineResult<ExecutionReport> {
        self.events.record(EngineEvent::RouteFound {
            base_token: route.base_token,
            hops: route.hops.len(),
            net_profit: route.net_profit,
        });
        log_search!(
            "Route {:?}: {} hops, net {}",
            route.token_path(),
            route.hops.len(),
            format_amount(route.net_profit, 18)
        );

        let (loan, expected_gross) = self.flash_loan_for(&route).await?;
        let tip_basis = self.native_value(loan.token, expected_gross).await;
        let bundle = self.orchestrator.build_bundle(
            BundleSource::Route(&route),
            &loan,
            tip_basis,
            unix_timestamp_secs(),
        )?;

        let opportunity = Opportunity {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            bundle,
            expected_gross,
            victim_tx,
        };
        let report = self.pipeline.execute(&opportunity).await;
        if let Some(net) = report.net_profit {
            log_profit!("Opportunity {} reached {:?}, net {}", report.opportunity_id, report.stage, format_amount(net, 18));
        }
        Ok(report)
    }

    /// Loan spec for a route plus the expected gross in loan-token units
    async fn flash_loan_for(&self, route: &Route) -> EngineResult<(FlashLoanSpec, U256)> {
        let provider = self.config.flash_loan_provider;
        let loan_token = match self.config.flash_loan_token {
            Some(token) if token != route.base_token => token,
            _ => {
                let gross = Route::gross_profit(&route.hops).unwrap_or_default();
                return Ok((FlashLoanSpec::for_route(provider, route), gross));
            }
        };

        let base = route.base_token;
        let buffered = route.amount_in().saturating_mul(U256::from(10_000 + SUBSTITUTION_BUFFER_BPS))
            / U256::from(10_000u64);
        let unpriced = || EngineError::construction(format!("cannot convert {:?} to {:?}", loan_token, base));

        let sizing = self
            .quotes
            .best_quote(base, loan_token, buffered)
            .await
            .ok_or_else(unpriced)?;
        let loan_amount = sizing.amount_out;
        let pre = self
            .quotes
            .best_quote(loan_token, base, loan_amount)
            .await
            .ok_or_else(unpriced)?;
        let post = self
            .quotes
            .best_quote(base, loan_token, route.amount_out())
            .await
            .ok_or_else(unpriced)?;

        let gross = post.amount_out.checked_sub(loan_amount).ok_or_else(|| {
            EngineError::InsufficientProfit {
                net_profit: U256::zero(),
                threshold: U256::zero(),
            }
        })?;
        let spec = FlashLoanSpec {
            provider,
            token: loan_token,
            amount: loan_amount,
            substitution: Some(Substitution {
                pre: pre.into_hop(loan_token, base),
                post: post.into_hop(base, loan_token),
            }),
        };
        Ok((spec, gross))
    }

    /// `amount` of `token` in wei, zero when it cannot be priced
    async fn native_value(&self, token: Address, amount: U256) -> U256 {
        if token == self.config.wrapped_native || amount.is_zero() {
            return amount;
        }
        match self.quotes.best_quote(token, self.config.wrapped_native, amount).await {
            Some(quote) => quote.amount_out,
            None => {
                debug!("No native price for {:?}; profit-share tip is zero", token);
                U256::zero()
            }
        }
    }

    fn settle_in_background(&self, report: &ExecutionReport) {
        let (Some(tx_hash), Some(target_block)) = (report.tx_hash, report.target_block) else {
            return;
        };
        if report.stage != ExecutionStage::Submitted {
            return;
        }
        let pipeline = Arc::clone(&self.pipeline);
        let id = report.opportunity_id;
        tokio::spawn(async move {
            let stage = pipeline.poll_inclusion(tx_hash, target_block).await;
            info!("Opportunity {} settled: {:?}", id, stage);
        });
    }

    /// Run until `shutdown` flips to `true`
    pub async fn run(
        self: Arc<Self>,
        mut pending: Option<mpsc::Receiver<PendingSwap>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!(
            "🚀 Starting Flash Arbitrage Strategy Engine: {} base tokens, scan every {:?}",
            self.config.base_tokens.len(),
            self.config.scan_interval
        );
        let mut ticker = tokio::time::interval(self.config.scan_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for report in self.scan_once().await {
                        self.settle_in_background(&report);
                    }
                }
                swap = recv_pending(&mut pending) => {
                    match swap {
                        Some(swap) => {
                            let engine = Arc::clone(&self);
                            tokio::spawn(async move {
                                if let Some(report) = engine.handle_pending_swap(&swap).await {
                                    engine.settle_in_background(&report);
                                }
                            });
                        }
                        None => {
                            warn!("Pending swap stream ended; continuing with periodic scans");
                            pending = None;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Strategy engine stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Next pending swap; never resolves without a stream
async fn recv_pending(pending: &mut Option<mpsc::Receiver<PendingSwap>>) -> Option<PendingSwap> {
    match pending {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::H256;
    use types::{DecodedSwap, DexKind};

    fn token(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn pending(token_in: Address, token_out: Address) -> PendingSwap {
        PendingSwap {
            decoded: DecodedSwap {
                tx_hash: H256::repeat_byte(0x01),
                dex: DexKind::UniswapV2,
                router: token(0xaa),
                token_in,
                token_out,
                amount_in: U256::from(10u64),
                amount_out_min: U256::from(9u64),
                recipient: token(0xcc),
                path: vec![token_in, token(0x44), token_out],
                fees: Vec::new(),
                exact_output: false,
            },
            raw: Bytes::from(vec![0x02]),
        }
    }

    #[test]
    fn test_merge_candidates_keeps_order_without_repeats() {
        let merged = merge_candidates(&[token(2), token(3)], &[token(3), token(4), token(2)]);
        assert_eq!(merged, vec![token(2), token(3), token(4)]);
    }

    #[test]
    fn test_select_base_for_pending_swap() {
        let bases = [token(1), token(9)];
        assert_eq!(select_base(&bases, &pending(token(5), token(1))), Some(token(1)));
        assert_eq!(select_base(&bases, &pending(token(9), token(1))), Some(token(1)));
        assert_eq!(select_base(&bases, &pending(token(9), token(5))), Some(token(9)));
        assert_eq!(select_base(&bases, &pending(token(5), token(6))), None);

        let swap = pending(token(1), token(5));
        assert_eq!(swap.decoded.counter_tokens(token(1)), vec![token(0x44), token(5)]);
    }
}
