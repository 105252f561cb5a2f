//! # Execution Pipeline - Simulate, Validate, Submit
//!
//! ## Purpose
//!
//! Drives one bundle through
//!
//! ```text
//! Discovered → Simulated → Validated → Submitted → Confirmed | Rejected
//! ```
//!
//! - **Health gate**: nothing is signed while the connection layer is critical
//! - **Simulated**: fresh nonce and node gas price (never cached, never a
//!   fallback default), executor transaction signed and
//!   posted to the simulation service behind any victim transaction. A failed
//!   simulation aborts the opportunity and is never retried; an unreachable
//!   simulation service is retried under `simulation_retry`
//! - **Validated**: behind the `validate` rate limit and circuit breaker. Gas
//!   price must be under the ceiling; profit is re-derived from the simulated
//!   balance change (falling back to the expected gross) minus simulated gas and
//!   the builder tip, and must clear `min_profit` again. Falling short is a
//!   normal rejection, not a breaker failure
//! - **Submitted**: behind the `submit` rate limit and circuit breaker, the
//!   relay bundle goes to every relay at once; one acceptance is enough
//!
//! [`ExecutionPipeline::poll_inclusion`] settles a submitted bundle by polling
//! for its receipt until a block deadline passes.

use ethers::types::{Address, Bytes, H256, U256};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use types::{format_amount, Bundle, EngineError, EngineResult};

use dex::abi::executor::encode_execute_bundle;
use mev::{
    BundleBuilder, BundleRelay, BundleSimulator, RelayAck, SignedTransaction, SimulationOutcome,
    SimulationRequest, TransactionSigner, UnsignedTransaction,
};
use network::{
    unix_timestamp_secs, with_retry, ChainClient, CircuitBreaker, CircuitBreakerConfig, RateLimiter,
    RetryPolicy,
};

use crate::events::{EngineEvent, EventSink};
use crate::explorer::convert_gas_cost;
use crate::gas_price::GasOracle;
use crate::quoting::QuoteSource;
use crate::{log_execution, log_profit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStage {
    Discovered,
    Simulated,
    Validated,
    Submitted,
    Confirmed,
    Rejected,
}

/// Timing for one stage transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStep {
    pub stage: ExecutionStage,
    pub duration_ms: u64,
    pub success: bool,
}

/// A bundle ready for execution
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub id: u64,
    pub bundle: Bundle,
    /// Gross profit expected at discovery, in loan-token units
    pub expected_gross: U256,
    /// Pending transaction to back-run; placed first in the relay bundle
    pub victim_tx: Option<Bytes>,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub opportunity_id: u64,
    /// Furthest stage reached, or `Rejected`
    pub stage: ExecutionStage,
    pub steps: Vec<ExecutionStep>,
    pub tx_hash: Option<H256>,
    pub target_block: Option<u64>,
    pub net_profit: Option<U256>,
    pub gas_used: Option<u64>,
    pub relay_acks: Vec<RelayAck>,
    pub simulation_url: Option<String>,
    pub error: Option<EngineError>,
}

impl ExecutionReport {
    fn new(opportunity_id: u64) -> Self {
        Self {
            opportunity_id,
            stage: ExecutionStage::Discovered,
            steps: Vec::new(),
            tx_hash: None,
            target_block: None,
            net_profit: None,
            gas_used: None,
            relay_acks: Vec::new(),
            simulation_url: None,
            error: None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.stage, ExecutionStage::Submitted | ExecutionStage::Confirmed)
    }

    /// Rejected because of an error rather than an expected negative result
    pub fn is_failure(&self) -> bool {
        self.error.as_ref().map_or(false, EngineError::is_failure)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub executor: Address,
    pub chain_id: u64,
    pub gas_limit: u64,
    pub max_gas_price: U256,
    pub priority_fee: U256,
    pub min_profit: U256,
    pub wrapped_native: Address,
    /// Stop after validation
    pub dry_run: bool,
    /// Blocks after the target block before an unseen bundle counts as missed
    pub inclusion_blocks: u64,
    pub inclusion_poll: Duration,
    /// Relay bundle validity from submission time
    pub bundle_validity_secs: u64,
    pub breaker: CircuitBreakerConfig,
    pub rate_limit: u32,
    pub rate_limit_window: Duration,
    /// Transient simulation service errors only
    pub simulation_retry: RetryPolicy,
}

/// Outcome of the validation stage that is not an error
enum Validation {
    Profitable(U256),
    Insufficient(U256),
    GasTooHigh(U256),
}

/// Signed executor transaction plus the context it was signed against
struct Prepared {
    signed: SignedTransaction,
    gas_price: U256,
    block: u64,
}

pub struct ExecutionPipeline {
    chain: Arc<dyn ChainClient>,
    signer: Arc<TransactionSigner>,
    simulator: Arc<dyn BundleSimulator>,
    relays: Vec<Arc<dyn BundleRelay>>,
    quotes: Arc<dyn QuoteSource>,
    gas: Arc<dyn GasOracle>,
    events: Arc<dyn EventSink>,
    validate_breaker: CircuitBreaker,
    submit_breaker: CircuitBreaker,
    limiter: RateLimiter,
    config: PipelineConfig,
}

impl ExecutionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<dyn ChainClient>,
        signer: Arc<TransactionSigner>,
        simulator: Arc<dyn BundleSimulator>,
        relays: Vec<Arc<dyn BundleRelay>>,
        quotes: Arc<dyn QuoteSource>,
        gas: Arc<dyn GasOracle>,
        events: Arc<dyn EventSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            validate_breaker: CircuitBreaker::new("validate", config.breaker.clone()),
            submit_breaker: CircuitBreaker::new("submit", config.breaker.clone()),
            limiter: RateLimiter::new(config.rate_limit, config.rate_limit_window),
            chain,
            signer,
            simulator,
            relays,
            quotes,
            gas,
            events,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn validate_breaker(&self) -> &CircuitBreaker {
        &self.validate_breaker
    }

    pub fn submit_breaker(&self) -> &CircuitBreaker {
        &self.submit_breaker
    }

    /// Run an opportunity as far as it goes; failures are reported, not returned
    pub async fn execute(&self, opportunity: &Opportunity) -> ExecutionReport {
        let mut report = ExecutionReport::new(opportunity.id);
        if let Err(e) = self.run(opportunity, &mut report).await {
            report.stage = ExecutionStage::Rejected;
            if e.is_failure() {
                warn!("Opportunity {} rejected: {}", opportunity.id, e);
            } else {
                debug!("Opportunity {} rejected: {}", opportunity.id, e);
            }
            report.error = Some(e);
        }

        self.events.record(EngineEvent::OpportunityFinished {
            opportunity_id: report.opportunity_id,
            stage: report.stage,
            net_profit: report.net_profit,
            error: report.error.as_ref().map(ToString::to_string),
        });
        report
    }

    async fn run(&self, opportunity: &Opportunity, report: &mut ExecutionReport) -> EngineResult<()> {
        let health = self.chain.health();
        if !health.allows_submission() {
            return Err(EngineError::Unhealthy {
                reason: format!("connection layer is {:?}", health),
            });
        }

        // Simulated
        let started = Instant::now();
        let simulated = self.simulate(opportunity).await;
        self.step(report, ExecutionStage::Simulated, started, simulated.is_ok());
        let (prepared, outcome) = simulated?;
        report.gas_used = Some(outcome.gas_used);
        report.simulation_url = outcome.simulation_url.clone();
        report.tx_hash = Some(prepared.signed.hash);

        // Validated
        let started = Instant::now();
        let validated = self.validate(opportunity, &prepared, &outcome).await;
        let net_profit = match validated {
            Ok(Validation::Profitable(net)) => {
                self.step(report, ExecutionStage::Validated, started, true);
                net
            }
            Ok(Validation::Insufficient(net)) => {
                self.step(report, ExecutionStage::Validated, started, false);
                return Err(EngineError::InsufficientProfit {
                    net_profit: net,
                    threshold: self.config.min_profit,
                });
            }
            Ok(Validation::GasTooHigh(price)) => {
                self.step(report, ExecutionStage::Validated, started, false);
                return Err(EngineError::NonceOrGasConflict {
                    reason: format!(
                        "gas price {} gwei above ceiling {} gwei",
                        price / U256::exp10(9),
                        self.config.max_gas_price / U256::exp10(9)
                    ),
                });
            }
            Err(e) => {
                self.step(report, ExecutionStage::Validated, started, false);
                return Err(e);
            }
        };
        report.net_profit = Some(net_profit);
        log_profit!(
            "Opportunity {} validated: net {} (gas {})",
            opportunity.id,
            format_amount(net_profit, 18),
            outcome.gas_used
        );

        if self.config.dry_run {
            info!("Dry run: opportunity {} not submitted", opportunity.id);
            return Ok(());
        }

        // Submitted
        let started = Instant::now();
        let target_block = prepared.block.saturating_add(1);
        let submitted = self.submit(opportunity, &prepared, target_block).await;
        self.step(report, ExecutionStage::Submitted, started, submitted.is_ok());
        report.relay_acks = submitted?;
        report.target_block = Some(target_block);
        log_execution!(
            "Opportunity {} submitted for block {} via {} relay(s): {:?}",
            opportunity.id,
            target_block,
            report.relay_acks.len(),
            prepared.signed.hash
        );
        Ok(())
    }

    fn step(&self, report: &mut ExecutionReport, stage: ExecutionStage, started: Instant, success: bool) {
        let duration_ms = started.elapsed().as_millis() as u64;
        report.steps.push(ExecutionStep {
            stage,
            duration_ms,
            success,
        });
        if success {
            report.stage = stage;
        }
        self.events.record(EngineEvent::StageCompleted {
            opportunity_id: report.opportunity_id,
            stage,
            duration_ms,
            success,
        });
    }

    async fn prepare(&self, bundle: &Bundle) -> EngineResult<Prepared> {
        let nonce = self.chain.transaction_count(self.signer.address()).await?;
        let gas_price = self.gas.current_gas_price().await?;
        let block = self.chain.block_number().await?;

        let max_fee_per_gas = gas_price.saturating_add(self.config.priority_fee);
        let signed = self.signer.sign(&UnsignedTransaction {
            to: self.config.executor,
            data: encode_execute_bundle(bundle)?,
            value: bundle.total_value(),
            nonce,
            gas_limit: U256::from(self.config.gas_limit),
            max_fee_per_gas,
            max_priority_fee_per_gas: self.config.priority_fee.min(max_fee_per_gas),
        })?;
        Ok(Prepared {
            signed,
            gas_price,
            block,
        })
    }

    async fn simulate(&self, opportunity: &Opportunity) -> EngineResult<(Prepared, SimulationOutcome)> {
        let prepared = self.prepare(&opportunity.bundle).await?;
        let request = SimulationRequest {
            transactions: self.ordered_transactions(opportunity, &prepared),
            network_id: self.config.chain_id,
            block_number: prepared.block,
        };
        let request = &request;
        let outcome = with_retry(&self.config.simulation_retry, "simulate_bundle", |_| {
            self.simulator.simulate(request)
        })
        .await?;
        Ok((prepared, outcome))
    }

    /// Victim first, then ours
    fn ordered_transactions(&self, opportunity: &Opportunity, prepared: &Prepared) -> Vec<Bytes> {
        opportunity
            .victim_tx
            .iter()
            .cloned()
            .chain(std::iter::once(prepared.signed.raw.clone()))
            .collect()
    }

    async fn validate(
        &self,
        opportunity: &Opportunity,
        prepared: &Prepared,
        outcome: &SimulationOutcome,
    ) -> EngineResult<Validation> {
        self.limiter.try_acquire("validate")?;
        self.validate_breaker
            .call(|| self.derive_profit(opportunity, prepared, outcome))
            .await
    }

    async fn derive_profit(
        &self,
        opportunity: &Opportunity,
        prepared: &Prepared,
        outcome: &SimulationOutcome,
    ) -> EngineResult<Validation> {
        if prepared.gas_price > self.config.max_gas_price {
            return Ok(Validation::GasTooHigh(prepared.gas_price));
        }

        let bundle = &opportunity.bundle;
        let profit_token = bundle.flashloan.token;
        let gross = outcome.profit().unwrap_or(opportunity.expected_gross);

        let gas_wei = prepared.gas_price.saturating_mul(U256::from(outcome.gas_used));
        let native_cost = gas_wei.saturating_add(bundle.total_value());
        let cost = convert_gas_cost(
            self.quotes.as_ref(),
            self.config.wrapped_native,
            profit_token,
            native_cost,
        )
        .await
        .ok_or_else(|| {
            EngineError::network(format!("cannot price gas in {:?}", profit_token))
        })?;

        let net = gross.saturating_sub(cost);
        if net > self.config.min_profit {
            Ok(Validation::Profitable(net))
        } else {
            Ok(Validation::Insufficient(net))
        }
    }

    async fn submit(
        &self,
        opportunity: &Opportunity,
        prepared: &Prepared,
        target_block: u64,
    ) -> EngineResult<Vec<RelayAck>> {
        self.limiter.try_acquire("submit")?;
        self.submit_breaker
            .call(|| self.send_to_relays(opportunity, prepared, target_block))
            .await
    }

    async fn send_to_relays(
        &self,
        opportunity: &Opportunity,
        prepared: &Prepared,
        target_block: u64,
    ) -> EngineResult<Vec<RelayAck>> {
        if self.relays.is_empty() {
            return Err(EngineError::config("no relays configured"));
        }

        let now = unix_timestamp_secs();
        let relay_bundle = self
            .ordered_transactions(opportunity, prepared)
            .into_iter()
            .fold(BundleBuilder::new(target_block), BundleBuilder::add_transaction)
            .set_timestamp_range(None, Some(now.saturating_add(self.config.bundle_validity_secs)))
            .build();

        let results = join_all(self.relays.iter().map(|relay| relay.send_bundle(&relay_bundle))).await;

        let mut acks = Vec::new();
        let mut first_error = None;
        for (relay, result) in self.relays.iter().zip(results) {
            match result {
                Ok(ack) => acks.push(ack),
                Err(e) => {
                    warn!("Relay {} refused bundle: {}", relay.name(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if acks.is_empty() {
            Err(first_error.unwrap_or_else(|| EngineError::network("no relay accepted the bundle")))
        } else {
            Ok(acks)
        }
    }

    /// Settle a submitted transaction: `Confirmed` once a successful receipt
    /// appears, `Rejected` on a reverted receipt or when the chain moves
    /// `inclusion_blocks` past the target without it
    pub async fn poll_inclusion(&self, tx_hash: H256, target_block: u64) -> ExecutionStage {
        let deadline = target_block.saturating_add(self.config.inclusion_blocks);
        loop {
            match self.chain.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    return match receipt.status.map(|s| s.as_u64()) {
                        Some(1) => {
                            log_execution!("Bundle tx {:?} included in block {:?}", tx_hash, receipt.block_number);
                            ExecutionStage::Confirmed
                        }
                        _ => {
                            warn!("Bundle tx {:?} reverted on-chain", tx_hash);
                            ExecutionStage::Rejected
                        }
                    };
                }
                Ok(None) => {}
                Err(e) => debug!("Receipt lookup for {:?} failed: {}", tx_hash, e),
            }

            match self.chain.block_number().await {
                Ok(block) if block > deadline => {
                    debug!("Bundle tx {:?} missed blocks {}..={}", tx_hash, target_block, deadline);
                    return ExecutionStage::Rejected;
                }
                Ok(_) => {}
                Err(e) => debug!("Block number lookup failed: {}", e),
            }
            tokio::time::sleep(self.config.inclusion_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelEventSink;
    use crate::gas_price::{FixedGasPrice, GasPriceFetcher};
    use crate::test_support::MockChain;
    use async_trait::async_trait;
    use ethers::types::{TransactionReceipt, U64};
    use mev::RelayBundle;
    use network::{CircuitState, HealthStatus};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use types::{Call, CallKind, FlashLoanRequest, Quote};

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn weth() -> Address {
        Address::repeat_byte(0x11)
    }

    struct FakeSimulator {
        outcome: Mutex<EngineResult<SimulationOutcome>>,
        requests: Mutex<Vec<SimulationRequest>>,
        unreachable_for: AtomicU32,
    }

    impl FakeSimulator {
        fn succeeding(gas_used: u64, delta: Option<&str>) -> Self {
            Self {
                outcome: Mutex::new(Ok(SimulationOutcome {
                    success: true,
                    gas_used,
                    error: None,
                    simulation_url: Some("https://sim/1".to_string()),
                    balance_delta: delta.map(str::to_string),
                })),
                requests: Mutex::new(Vec::new()),
                unreachable_for: AtomicU32::new(0),
            }
        }

        /// Answer with a network error for the first `calls` requests
        fn unreachable_for(self, calls: u32) -> Self {
            self.unreachable_for.store(calls, Ordering::SeqCst);
            self
        }

        fn failing() -> Self {
            Self {
                outcome: Mutex::new(Err(EngineError::SimulationFailure {
                    reason: "execution reverted".to_string(),
                    gas_used: Some(21_000),
                })),
                requests: Mutex::new(Vec::new()),
                unreachable_for: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl BundleSimulator for FakeSimulator {
        async fn simulate(&self, request: &SimulationRequest) -> EngineResult<SimulationOutcome> {
            self.requests.lock().push(request.clone());
            let unreachable = self
                .unreachable_for
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if unreachable {
                return Err(EngineError::network("simulation service unavailable"));
            }
            self.outcome.lock().clone()
        }
    }

    struct FakeRelay {
        name: String,
        accept: bool,
        calls: AtomicU32,
        bundles: Mutex<Vec<RelayBundle>>,
    }

    impl FakeRelay {
        fn new(name: &str, accept: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                accept,
                calls: AtomicU32::new(0),
                bundles: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl BundleRelay for FakeRelay {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send_bundle(&self, bundle: &RelayBundle) -> EngineResult<RelayAck> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bundles.lock().push(bundle.clone());
            if self.accept {
                Ok(RelayAck {
                    relay: self.name.clone(),
                    bundle_hash: Some(H256::repeat_byte(0xab)),
                })
            } else {
                Err(EngineError::network("relay unavailable"))
            }
        }
    }

    struct NoQuotes;

    #[async_trait]
    impl QuoteSource for NoQuotes {
        async fn best_quote(&self, _: Address, _: Address, _: U256) -> Option<Quote> {
            None
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            executor: Address::repeat_byte(0xee),
            chain_id: 1,
            gas_limit: 800_000,
            max_gas_price: U256::from(100) * U256::exp10(9),
            priority_fee: U256::from(2) * U256::exp10(9),
            min_profit: U256::from(1_000_000_000_000_000u64),
            wrapped_native: weth(),
            dry_run: false,
            inclusion_blocks: 3,
            inclusion_poll: Duration::from_millis(100),
            bundle_validity_secs: 120,
            breaker: CircuitBreakerConfig {
                max_failures: 2,
                reset_timeout: Duration::from_secs(30),
            },
            rate_limit: 10,
            rate_limit_window: Duration::from_secs(60),
            simulation_retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(50),
                max_delay: Duration::from_millis(200),
                jitter: false,
            },
        }
    }

    fn opportunity(id: u64, tip: u64) -> Opportunity {
        Opportunity {
            id,
            bundle: Bundle {
                flashloan: FlashLoanRequest {
                    provider: Address::repeat_byte(0xba),
                    token: weth(),
                    amount: U256::exp10(18),
                },
                calls: vec![
                    Call::new(CallKind::Swap, Address::repeat_byte(0x01), Bytes::from(vec![1, 2])),
                    Call::new(CallKind::Tip, Address::repeat_byte(0xbb), Bytes::default())
                        .with_value(U256::from(tip)),
                ],
                base_token: weth(),
                expected_profit: U256::from(1_500_000_000_000_000u64),
            },
            expected_gross: U256::from(2_000_000_000_000_000u64),
            victim_tx: None,
        }
    }

    struct Harness {
        chain: Arc<MockChain>,
        simulator: Arc<FakeSimulator>,
        relays: Vec<Arc<FakeRelay>>,
        pipeline: ExecutionPipeline,
        events: tokio::sync::mpsc::Receiver<EngineEvent>,
    }

    fn harness(simulator: FakeSimulator, relays: Vec<Arc<FakeRelay>>, config: PipelineConfig) -> Harness {
        harness_with_gas(simulator, relays, config, |_| Arc::new(FixedGasPrice(U256::exp10(9))))
    }

    fn harness_with_gas(
        simulator: FakeSimulator,
        relays: Vec<Arc<FakeRelay>>,
        config: PipelineConfig,
        gas: impl FnOnce(Arc<MockChain>) -> Arc<dyn GasOracle>,
    ) -> Harness {
        let chain = Arc::new(MockChain::new());
        let gas = gas(chain.clone());
        let simulator = Arc::new(simulator);
        let (sink, events) = ChannelEventSink::new(256);
        let pipeline = ExecutionPipeline::new(
            chain.clone(),
            Arc::new(TransactionSigner::from_private_key(TEST_KEY, 1).unwrap()),
            simulator.clone(),
            relays.iter().map(|r| r.clone() as Arc<dyn BundleRelay>).collect(),
            Arc::new(NoQuotes),
            gas,
            Arc::new(sink),
            config,
        );
        Harness {
            chain,
            simulator,
            relays,
            pipeline,
            events,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_profitable_bundle_is_submitted() {
        // 0.003 gross - 300k gas at 1 gwei (0.0003) - 0.0005 tip = 0.0022
        let mut h = harness(
            FakeSimulator::succeeding(300_000, Some("3000000000000000")),
            vec![FakeRelay::new("a", false), FakeRelay::new("b", true)],
            config(),
        );
        let report = h.pipeline.execute(&opportunity(1, 500_000_000_000_000)).await;

        assert_eq!(report.stage, ExecutionStage::Submitted, "{:?}", report.error);
        assert_eq!(report.net_profit, Some(U256::from(2_200_000_000_000_000u64)));
        assert_eq!(report.target_block, Some(101));
        assert_eq!(report.relay_acks.len(), 1);
        assert_eq!(report.relay_acks[0].relay, "b");
        assert_eq!(report.steps.len(), 3);
        assert!(report.steps.iter().all(|s| s.success));
        assert_eq!(h.relays[0].calls.load(Ordering::SeqCst), 1);

        let request = h.simulator.requests.lock()[0].clone();
        assert_eq!(request.block_number, 100);
        assert_eq!(request.transactions.len(), 1);

        let mut stages = Vec::new();
        while let Ok(event) = h.events.try_recv() {
            stages.push(event.name());
        }
        assert_eq!(
            stages,
            vec!["stage_completed", "stage_completed", "stage_completed", "opportunity_finished"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_victim_precedes_our_transaction() {
        let h = harness(
            FakeSimulator::succeeding(100_000, None),
            vec![FakeRelay::new("a", true)],
            config(),
        );
        let victim = Bytes::from(vec![0x02, 0xf8, 0x01]);
        let mut opp = opportunity(2, 0);
        opp.victim_tx = Some(victim.clone());
        let report = h.pipeline.execute(&opp).await;
        assert_eq!(report.stage, ExecutionStage::Submitted);

        let simulated = h.simulator.requests.lock()[0].transactions.clone();
        assert_eq!(simulated.len(), 2);
        assert_eq!(simulated[0], victim);

        let relayed = h.relays[0].bundles.lock()[0].clone();
        assert_eq!(relayed.transactions[0], victim);
        assert_eq!(relayed.target_block, 101);
        assert!(relayed.max_timestamp.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_failure_aborts_without_retry() {
        let h = harness(FakeSimulator::failing(), vec![FakeRelay::new("a", true)], config());
        let report = h.pipeline.execute(&opportunity(3, 0)).await;

        assert_eq!(report.stage, ExecutionStage::Rejected);
        assert!(matches!(report.error, Some(EngineError::SimulationFailure { .. })));
        assert_eq!(h.simulator.requests.lock().len(), 1);
        assert_eq!(h.relays[0].calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.steps.len(), 1);
        assert!(!report.steps[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_simulator_is_retried() {
        let h = harness(
            FakeSimulator::succeeding(100_000, None).unreachable_for(1),
            vec![FakeRelay::new("a", true)],
            config(),
        );
        let report = h.pipeline.execute(&opportunity(4, 0)).await;
        assert_eq!(report.stage, ExecutionStage::Submitted, "{:?}", report.error);
        assert_eq!(h.simulator.requests.lock().len(), 2);

        let h = harness(
            FakeSimulator::succeeding(100_000, None).unreachable_for(5),
            vec![FakeRelay::new("a", true)],
            config(),
        );
        let report = h.pipeline.execute(&opportunity(5, 0)).await;
        assert_eq!(report.stage, ExecutionStage::Rejected);
        assert!(matches!(report.error, Some(EngineError::Network { .. })));
        assert_eq!(h.simulator.requests.lock().len(), 3);
        assert_eq!(h.relays[0].calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gas_price_failure_blocks_signing() {
        let fallback = U256::from(30) * U256::exp10(9);
        let h = harness_with_gas(
            FakeSimulator::succeeding(100_000, Some("3000000000000000")),
            vec![FakeRelay::new("a", true)],
            config(),
            |chain| Arc::new(GasPriceFetcher::new(chain, Duration::from_secs(12), fallback)),
        );
        h.chain.fail_gas_price();

        let report = h.pipeline.execute(&opportunity(9, 0)).await;
        assert_ne!(report.stage, ExecutionStage::Submitted);
        assert_eq!(report.stage, ExecutionStage::Rejected);
        assert!(matches!(report.error, Some(EngineError::Network { .. })));
        assert!(report.tx_hash.is_none());
        assert!(h.simulator.requests.lock().is_empty());
        assert_eq!(h.relays[0].calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signing_uses_node_price_over_cache() {
        let cached = U256::exp10(9);
        let h = harness_with_gas(
            FakeSimulator::succeeding(100_000, None),
            vec![FakeRelay::new("a", true)],
            config(),
            |chain| {
                let fetcher = GasPriceFetcher::new(chain, Duration::from_secs(12), cached);
                fetcher.update(cached);
                Arc::new(fetcher)
            },
        );
        // Node now reports 150 gwei, above the 100 gwei ceiling
        h.chain.set_gas_price(U256::from(150) * U256::exp10(9));

        let report = h.pipeline.execute(&opportunity(10, 0)).await;
        assert!(matches!(report.error, Some(EngineError::NonceOrGasConflict { .. })));
        assert_eq!(h.relays[0].calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_profit_is_not_a_breaker_failure() {
        // expected gross 0.002 - 0.0008 gas - 0.0005 tip = 0.0007 < 0.001
        let h = harness(
            FakeSimulator::succeeding(800_000, None),
            vec![FakeRelay::new("a", true)],
            config(),
        );
        for id in 0..4 {
            let report = h.pipeline.execute(&opportunity(id, 500_000_000_000_000)).await;
            assert_eq!(report.stage, ExecutionStage::Rejected);
            assert!(matches!(report.error, Some(EngineError::InsufficientProfit { .. })));
            assert!(!report.is_failure());
        }
        assert_eq!(h.pipeline.validate_breaker().state(), CircuitState::Closed);
        assert_eq!(h.relays[0].calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gas_ceiling_rejects() {
        let mut cfg = config();
        cfg.max_gas_price = U256::from(500_000_000u64);
        let h = harness(FakeSimulator::succeeding(100_000, None), vec![FakeRelay::new("a", true)], cfg);
        let report = h.pipeline.execute(&opportunity(5, 0)).await;
        assert!(matches!(report.error, Some(EngineError::NonceOrGasConflict { .. })));
        assert_eq!(h.relays[0].calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_health_blocks_signing() {
        let h = harness(FakeSimulator::succeeding(100_000, None), vec![FakeRelay::new("a", true)], config());
        h.chain.set_health(HealthStatus::Critical);
        let report = h.pipeline.execute(&opportunity(6, 0)).await;
        assert!(matches!(report.error, Some(EngineError::Unhealthy { .. })));
        assert!(h.simulator.requests.lock().is_empty());
        assert!(report.steps.is_empty());

        h.chain.set_health(HealthStatus::Reconnecting { attempt: 2 });
        let report = h.pipeline.execute(&opportunity(7, 0)).await;
        assert_eq!(report.stage, ExecutionStage::Submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_breaker_opens_and_probes() {
        let relay = FakeRelay::new("down", false);
        let h = harness(FakeSimulator::succeeding(100_000, None), vec![relay.clone()], config());

        for id in 0..2 {
            let report = h.pipeline.execute(&opportunity(id, 0)).await;
            assert!(matches!(report.error, Some(EngineError::Network { .. })));
        }
        assert_eq!(h.pipeline.submit_breaker().state(), CircuitState::Open);

        let report = h.pipeline.execute(&opportunity(2, 0)).await;
        assert!(matches!(report.error, Some(EngineError::CircuitOpen { .. })));
        assert_eq!(relay.calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        let report = h.pipeline.execute(&opportunity(3, 0)).await;
        assert!(matches!(report.error, Some(EngineError::Network { .. })));
        assert_eq!(relay.calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.pipeline.submit_breaker().state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_on_submission() {
        let mut cfg = config();
        cfg.rate_limit = 3;
        let h = harness(FakeSimulator::succeeding(100_000, None), vec![FakeRelay::new("a", true)], cfg);

        for id in 0..3 {
            assert_eq!(h.pipeline.execute(&opportunity(id, 0)).await.stage, ExecutionStage::Submitted);
        }
        let report = h.pipeline.execute(&opportunity(3, 0)).await;
        assert!(matches!(report.error, Some(EngineError::RateLimited { .. })));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(h.pipeline.execute(&opportunity(4, 0)).await.stage, ExecutionStage::Submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_stops_after_validation() {
        let mut cfg = config();
        cfg.dry_run = true;
        let h = harness(FakeSimulator::succeeding(100_000, None), vec![FakeRelay::new("a", true)], cfg);
        let report = h.pipeline.execute(&opportunity(8, 0)).await;
        assert_eq!(report.stage, ExecutionStage::Validated);
        assert!(report.error.is_none());
        assert_eq!(h.relays[0].calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_inclusion() {
        let h = harness(FakeSimulator::succeeding(100_000, None), vec![], config());
        let included = H256::repeat_byte(0x01);
        let reverted = H256::repeat_byte(0x02);
        h.chain.add_receipt(TransactionReceipt {
            transaction_hash: included,
            status: Some(U64::from(1)),
            block_number: Some(U64::from(101)),
            ..Default::default()
        });
        h.chain.add_receipt(TransactionReceipt {
            transaction_hash: reverted,
            status: Some(U64::zero()),
            ..Default::default()
        });

        assert_eq!(h.pipeline.poll_inclusion(included, 101).await, ExecutionStage::Confirmed);
        assert_eq!(h.pipeline.poll_inclusion(reverted, 101).await, ExecutionStage::Rejected);

        h.chain.set_block(105);
        assert_eq!(
            h.pipeline.poll_inclusion(H256::repeat_byte(0x03), 101).await,
            ExecutionStage::Rejected
        );
    }
}
