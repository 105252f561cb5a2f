//! Shared fakes for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Transaction, TransactionReceipt, H256, U256};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flash_arbitrage::events::ChannelEventSink;
use flash_arbitrage::{
    BundleOrchestrator, EngineEvent, ExecutionPipeline, ExplorerConfig, FixedGasPrice,
    OrchestratorConfig, PipelineConfig, QuoteSource, RouteExplorer, StrategyConfig,
    StrategyEngine, TipPolicy,
};
use mev::{
    BundleRelay, BundleSimulator, RelayAck, RelayBundle, SimulationOutcome, SimulationRequest,
    TransactionSigner,
};
use network::{ChainClient, CircuitBreakerConfig, HealthStatus, RetryPolicy};
use tokio::sync::mpsc;
use types::{DexKind, EngineError, EngineResult, Quote};

pub const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const GWEI: u64 = 1_000_000_000;
pub const HOP_GAS: u64 = 125_000;

pub fn token(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn weth() -> Address {
    token(0x11)
}

pub fn usdc() -> Address {
    token(0x22)
}

pub fn router() -> Address {
    token(0xaa)
}

pub fn eth(milli: u64) -> U256 {
    U256::from(milli) * U256::exp10(15)
}

/// Chain at block 100 with nonce 0; unknown contract calls revert
pub struct StaticChain {
    health: Mutex<HealthStatus>,
    receipts: Mutex<HashMap<H256, TransactionReceipt>>,
}

impl StaticChain {
    pub fn new() -> Self {
        Self {
            health: Mutex::new(HealthStatus::Healthy),
            receipts: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_health(&self, health: HealthStatus) {
        *self.health.lock() = health;
    }
}

#[async_trait]
impl ChainClient for StaticChain {
    async fn block_number(&self) -> network::Result<u64> {
        Ok(100)
    }

    async fn gas_price(&self) -> network::Result<U256> {
        Ok(U256::from(2 * GWEI))
    }

    async fn transaction_count(&self, _address: Address) -> network::Result<U256> {
        Ok(U256::zero())
    }

    async fn call_contract(&self, _to: Address, _data: Bytes) -> network::Result<Bytes> {
        Err(network::NetworkError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
        })
    }

    async fn estimate_gas(
        &self,
        _from: Address,
        _to: Address,
        _data: Bytes,
        _value: U256,
    ) -> network::Result<U256> {
        Ok(U256::from(300_000))
    }

    async fn transaction_by_hash(&self, _hash: H256) -> network::Result<Option<Transaction>> {
        Ok(None)
    }

    async fn transaction_receipt(&self, hash: H256) -> network::Result<Option<TransactionReceipt>> {
        Ok(self.receipts.lock().get(&hash).cloned())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> network::Result<H256> {
        Ok(H256::from(ethers::utils::keccak256(&raw)))
    }

    fn health(&self) -> HealthStatus {
        *self.health.lock()
    }
}

/// Exchange table keyed by (token_in, token_out, amount_in)
#[derive(Default)]
pub struct TableQuotes {
    table: HashMap<(Address, Address, U256), U256>,
}

impl TableQuotes {
    pub fn with(mut self, from: Address, to: Address, amount_in: U256, amount_out: U256) -> Self {
        self.table.insert((from, to, amount_in), amount_out);
        self
    }
}

#[async_trait]
impl QuoteSource for TableQuotes {
    async fn best_quote(&self, token_in: Address, token_out: Address, amount_in: U256) -> Option<Quote> {
        let amount_out = *self.table.get(&(token_in, token_out, amount_in))?;
        Some(Quote {
            dex: DexKind::UniswapV2,
            router: router(),
            amount_in,
            amount_out,
            estimated_gas: HOP_GAS,
            fee_tier: None,
        })
    }
}

/// WETH → USDC → WETH returning `back` for one ether in
pub fn weth_usdc_loop(back: U256) -> TableQuotes {
    let usdc_out = U256::from(1_800_000_000u64);
    TableQuotes::default()
        .with(weth(), usdc(), eth(1000), usdc_out)
        .with(usdc(), weth(), usdc_out, back)
}

pub struct FakeSimulator {
    gas_used: u64,
    pub requests: Mutex<Vec<SimulationRequest>>,
}

impl FakeSimulator {
    pub fn new(gas_used: u64) -> Arc<Self> {
        Arc::new(Self {
            gas_used,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl BundleSimulator for FakeSimulator {
    async fn simulate(&self, request: &SimulationRequest) -> EngineResult<SimulationOutcome> {
        self.requests.lock().push(request.clone());
        Ok(SimulationOutcome {
            success: true,
            gas_used: self.gas_used,
            error: None,
            simulation_url: None,
            balance_delta: None,
        })
    }
}

pub struct FakeRelay {
    accept: bool,
    pub calls: AtomicU32,
    pub bundles: Mutex<Vec<RelayBundle>>,
}

impl FakeRelay {
    pub fn new(accept: bool) -> Arc<Self> {
        Arc::new(Self {
            accept,
            calls: AtomicU32::new(0),
            bundles: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BundleRelay for FakeRelay {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send_bundle(&self, bundle: &RelayBundle) -> EngineResult<RelayAck> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bundles.lock().push(bundle.clone());
        if self.accept {
            Ok(RelayAck {
                relay: "fake".to_string(),
                bundle_hash: Some(H256::repeat_byte(0xab)),
            })
        } else {
            Err(EngineError::network("relay unavailable"))
        }
    }
}

pub fn explorer_config() -> ExplorerConfig {
    ExplorerConfig {
        min_profit: eth(1),
        base_gas: 0,
        wrapped_native: weth(),
    }
}

pub fn orchestrator() -> BundleOrchestrator {
    BundleOrchestrator::new(OrchestratorConfig {
        executor: token(0xee),
        builder_payment: token(0xbb),
        tip: TipPolicy::ProfitShare { bps: 1_000 },
        slippage_bps: 50,
        deadline_secs: 120,
        routers: HashMap::from([(DexKind::UniswapV2, router())]),
    })
}

pub fn pipeline_config(dry_run: bool) -> PipelineConfig {
    PipelineConfig {
        executor: token(0xee),
        chain_id: 1,
        gas_limit: 800_000,
        max_gas_price: U256::from(100 * GWEI),
        priority_fee: U256::from(GWEI),
        min_profit: eth(1),
        wrapped_native: weth(),
        dry_run,
        inclusion_blocks: 3,
        inclusion_poll: Duration::from_millis(100),
        bundle_validity_secs: 120,
        breaker: CircuitBreakerConfig {
            max_failures: 3,
            reset_timeout: Duration::from_secs(30),
        },
        rate_limit: 10,
        rate_limit_window: Duration::from_secs(60),
        simulation_retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(100),
            jitter: false,
        },
    }
}

pub struct Harness {
    pub engine: StrategyEngine,
    pub chain: Arc<StaticChain>,
    pub simulator: Arc<FakeSimulator>,
    pub relay: Arc<FakeRelay>,
    pub events: mpsc::Receiver<EngineEvent>,
}

/// Engine over a fixed quote table, fixed 2 gwei gas and fake relay/simulator
pub fn harness(quotes: TableQuotes, dry_run: bool) -> Harness {
    let chain = Arc::new(StaticChain::new());
    let quotes: Arc<dyn QuoteSource> = Arc::new(quotes);
    let gas = Arc::new(FixedGasPrice(U256::from(2 * GWEI)));
    let (sink, events) = ChannelEventSink::new(256);
    let sink = Arc::new(sink);
    let simulator = FakeSimulator::new(2 * HOP_GAS);
    let relay = FakeRelay::new(true);
    let signer = TransactionSigner::from_private_key(TEST_KEY, 1).unwrap();

    let explorer = RouteExplorer::new(quotes.clone(), gas.clone(), explorer_config());
    let pipeline = ExecutionPipeline::new(
        chain.clone(),
        Arc::new(signer),
        simulator.clone(),
        vec![relay.clone() as Arc<dyn BundleRelay>],
        quotes.clone(),
        gas,
        sink.clone(),
        pipeline_config(dry_run),
    );
    let engine = StrategyEngine::new(
        Arc::new(explorer),
        Arc::new(orchestrator()),
        Arc::new(pipeline),
        quotes,
        None,
        sink,
        StrategyConfig {
            base_tokens: vec![weth()],
            candidate_tokens: vec![usdc()],
            trade_amount: eth(1000),
            max_hops: 3,
            scan_interval: Duration::from_secs(1),
            flash_loan_provider: token(0xba),
            flash_loan_token: None,
            wrapped_native: weth(),
        },
    );

    Harness {
        engine,
        chain,
        simulator,
        relay,
        events,
    }
}

pub fn drain(events: &mut mpsc::Receiver<EngineEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.name());
    }
    names
}
