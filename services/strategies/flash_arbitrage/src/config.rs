//! # Flash Arbitrage Configuration - Dynamic Parameter Management
//!
//! ## Purpose
//!
//! Runtime parameters for every engine component without hardcoded values:
//! endpoints, quoting venues, route search limits, execution guards, relays and
//! the optional mempool and token-universe feeds. Loaded from a JSON file,
//! overridden from `ARBITRAGE_*` environment variables and validated before
//! anything connects.
//!
//! ## Integration Points
//!
//! - **Input Sources**: JSON configuration files, environment variables, CLI flags
//! - **Output Destinations**: connection layer, quote adapters, explorer,
//!   orchestrator, execution pipeline, mempool watcher, token feed
//! - **Secrets**: the signing key is read from `ARBITRAGE_PRIVATE_KEY` only and
//!   never serialised
//!
//! ## Architecture Role
//!
//! ```text
//! Environment Variables → [Configuration Loading] → Engine Components
//!        ↓                        ↓                       ↓
//! JSON Config Files      Parameter Validation     Quote venues / Explorer
//! CLI Flags              Default Application      Pipeline guards / Relays
//! ```
//!
//! On-chain amounts (`trade_amount`, `min_profit`, fixed tips) are `U256` in the
//! base token's smallest units and serialise as `0x` hex strings; gas prices
//! are human-readable gwei decimals.

use anyhow::{bail, Context};
use dex::registry::{SUSHISWAP_ROUTER, UNISWAP_V2_ROUTER, UNISWAP_V3_ROUTER, WETH};
use ethers::types::{Address, H160, U256};
use hex_literal::hex;
use network::{CircuitBreakerConfig, ConnectionConfig, RetryPolicy};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use types::DexKind;

use crate::orchestrator::TipPolicy;

/// Environment variable holding the executor signing key
pub const PRIVATE_KEY_ENV: &str = "ARBITRAGE_PRIVATE_KEY";
/// Environment variable holding the relay authentication key
pub const RELAY_AUTH_KEY_ENV: &str = "ARBITRAGE_RELAY_AUTH_KEY";

/// Complete configuration for the flash arbitrage engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashArbitrageConfig {
    /// Node connectivity
    pub network: NetworkConfig,
    /// Quote venues and aggregator limits
    pub quoting: QuotingConfig,
    /// Route search parameters
    pub detector: DetectorConfig,
    /// Bundle construction, simulation, guards and relays
    pub executor: ExecutorConfig,
    /// Pending-transaction watcher
    pub mempool: MempoolConfig,
    /// External token universe feed
    pub token_feed: TokenFeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub chain_id: u64,
    /// HTTP JSON-RPC endpoints, primary first
    pub rpc_urls: Vec<String>,
    /// WebSocket endpoints for subscriptions, primary first
    pub ws_urls: Vec<String>,
    pub request_timeout_ms: u64,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_reconnect_attempts: u32,
    pub heartbeat_interval_secs: u64,
    pub max_requests_per_second: Option<u32>,
    /// Wrapped native token used for gas conversion and ETH-denominated swaps
    pub wrapped_native: Address,
}

/// How a venue is queried for prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoterKind {
    /// Router `getAmountsOut`
    V2Router,
    /// Factory `getPair` + pair reserves with local V2 math
    V2Pair,
    /// On-chain V3 Quoter contract
    V3Quoter,
    /// Pool `slot0` + `liquidity`, single-tick estimate
    V3Pool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueConfig {
    pub dex: DexKind,
    pub kind: QuoterKind,
    /// Router that executes swaps on this venue
    pub router: Address,
    /// Factory for pair/pool lookups (`v2_pair`, `v3_pool`)
    #[serde(default)]
    pub factory: Option<Address>,
    /// Quoter contract (`v3_quoter`)
    #[serde(default)]
    pub quoter: Option<Address>,
    /// V3 fee tiers to try, in pips
    #[serde(default)]
    pub fee_tiers: Vec<u32>,
    /// V2 pool fee in basis points
    #[serde(default = "default_v2_fee_bps")]
    pub fee_bps: u32,
}

fn default_v2_fee_bps() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotingConfig {
    /// Adapter queries in flight at once
    pub max_concurrent_quotes: usize,
    pub quote_timeout_ms: u64,
    /// Registration order is the tie-break order
    pub venues: Vec<VenueConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Loop start/end tokens scanned periodically
    pub base_tokens: Vec<Address>,
    /// Intermediate tokens always considered
    pub candidate_tokens: Vec<Address>,
    /// Input amount per scan, base-token smallest units
    pub trade_amount: U256,
    /// Maximum hops in a loop, including the closing hop
    pub max_hops: usize,
    /// Net profit must exceed this, base-token smallest units
    pub min_profit: U256,
    /// Fixed executor overhead added to per-hop gas estimates
    pub base_gas: u64,
    pub scan_interval_ms: u64,
    /// Per-hop slippage tolerance applied to quoted outputs
    pub slippage_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Flash-loan executor contract receiving `executeBundle`
    pub executor_contract: Address,
    /// Flash-loan provider passed to the executor
    pub flash_loan_provider: Address,
    /// Borrow this token instead of the route's base token when set; swaps
    /// into and out of the base token are added around the route
    pub flash_loan_token: Option<Address>,
    pub simulation_url: String,
    pub simulation_timeout_ms: u64,
    /// Attempts per simulation when the service is unreachable
    pub simulation_attempts: u32,
    pub relays: Vec<RelayConfig>,
    pub relay_timeout_ms: u64,
    pub max_gas_price_gwei: Decimal,
    pub priority_fee_gwei: Decimal,
    pub default_gas_price_gwei: Decimal,
    pub gas_price_cache_secs: u64,
    pub gas_limit: u64,
    /// Swap deadline relative to bundle construction
    pub deadline_secs: u64,
    /// Blocks after the target block to wait for inclusion
    pub inclusion_blocks: u64,
    pub inclusion_poll_ms: u64,
    /// Receiver of the miner tip
    pub builder_payment_address: Address,
    pub tip: TipPolicy,
    pub breaker_max_failures: u32,
    pub breaker_reset_secs: u64,
    /// Calls per window for each of `validate` and `submit`
    pub rate_limit: u32,
    pub rate_limit_window_secs: u64,
    /// Stop after validation; nothing is sent to relays
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    pub enabled: bool,
    /// Request full transaction bodies in notifications when the node supports it
    pub full_bodies: bool,
    pub dedup_capacity: usize,
    pub max_concurrent_fetches: usize,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenFeedConfig {
    pub url: Option<String>,
    pub top_n: usize,
    pub refresh_secs: u64,
    pub timeout_ms: u64,
}

const USDC: Address = H160(hex!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"));
const USDT: Address = H160(hex!("dAC17F958D2ee523a2206206994597C13D831ec7"));
const DAI: Address = H160(hex!("6B175474E89094C44Da98b954EedeAC495271d0F"));
const WBTC: Address = H160(hex!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"));

const UNISWAP_V2_FACTORY: Address = H160(hex!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"));
const UNISWAP_V3_FACTORY: Address = H160(hex!("1F98431c8aD98523631AE4a59f267346ea31F984"));
const UNISWAP_V3_QUOTER: Address = H160(hex!("b27308f9F90D607463bb33eA1BeBb41C27CE5AB6"));
const BALANCER_VAULT: Address = H160(hex!("BA12222222228d8Ba445958a75a0704d566BF2C8"));

impl Default for FlashArbitrageConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            quoting: QuotingConfig::default(),
            detector: DetectorConfig::default(),
            executor: ExecutorConfig::default(),
            mempool: MempoolConfig::default(),
            token_feed: TokenFeedConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            rpc_urls: vec!["http://127.0.0.1:8545".to_string()],
            ws_urls: vec!["ws://127.0.0.1:8546".to_string()],
            request_timeout_ms: network::DEFAULT_REQUEST_TIMEOUT_MS,
            base_backoff_ms: network::DEFAULT_BASE_BACKOFF_MS,
            max_backoff_ms: network::DEFAULT_MAX_BACKOFF_MS,
            max_reconnect_attempts: network::DEFAULT_MAX_RETRIES,
            heartbeat_interval_secs: network::DEFAULT_HEARTBEAT_INTERVAL_SECS,
            max_requests_per_second: None,
            wrapped_native: WETH,
        }
    }
}

impl Default for QuotingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_quotes: 8,
            quote_timeout_ms: 1_500,
            venues: vec![
                VenueConfig {
                    dex: DexKind::UniswapV2,
                    kind: QuoterKind::V2Pair,
                    router: UNISWAP_V2_ROUTER,
                    factory: Some(UNISWAP_V2_FACTORY),
                    quoter: None,
                    fee_tiers: Vec::new(),
                    fee_bps: 30,
                },
                VenueConfig {
                    dex: DexKind::SushiswapV2,
                    kind: QuoterKind::V2Router,
                    router: SUSHISWAP_ROUTER,
                    factory: None,
                    quoter: None,
                    fee_tiers: Vec::new(),
                    fee_bps: 30,
                },
                VenueConfig {
                    dex: DexKind::UniswapV3,
                    kind: QuoterKind::V3Quoter,
                    router: UNISWAP_V3_ROUTER,
                    factory: Some(UNISWAP_V3_FACTORY),
                    quoter: Some(UNISWAP_V3_QUOTER),
                    fee_tiers: vec![500, 3_000, 10_000],
                    fee_bps: 0,
                },
            ],
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_tokens: vec![WETH],
            candidate_tokens: vec![USDC, USDT, DAI, WBTC],
            trade_amount: U256::exp10(18),                    // 1 WETH
            max_hops: 3,
            min_profit: U256::exp10(15),                      // 0.001 WETH
            base_gas: 120_000,
            scan_interval_ms: 12_000,                         // one block
            slippage_bps: 30,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: "flashbots".to_string(),
            url: "https://relay.flashbots.net".to_string(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            executor_contract: Address::zero(),
            flash_loan_provider: BALANCER_VAULT,
            flash_loan_token: None,
            simulation_url: "http://127.0.0.1:8080/simulate".to_string(),
            simulation_timeout_ms: 3_000,
            simulation_attempts: 3,
            relays: vec![RelayConfig::default()],
            relay_timeout_ms: 2_000,
            max_gas_price_gwei: dec!(150),
            priority_fee_gwei: dec!(2),
            default_gas_price_gwei: dec!(30),
            gas_price_cache_secs: 12,
            gas_limit: 800_000,
            deadline_secs: 120,
            inclusion_blocks: 3,
            inclusion_poll_ms: 2_000,
            builder_payment_address: Address::zero(),
            tip: TipPolicy::ProfitShare { bps: 5_000 },       // half of expected profit
            breaker_max_failures: 5,
            breaker_reset_secs: 60,
            rate_limit: 10,
            rate_limit_window_secs: 60,
            dry_run: false,
        }
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            full_bodies: false,
            dedup_capacity: 10_000,
            max_concurrent_fetches: 32,
            channel_capacity: 1_024,
        }
    }
}

impl Default for TokenFeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            top_n: 25,
            refresh_secs: 3_600,
            timeout_ms: 5_000,
        }
    }
}

/// gwei decimal to wei
pub fn gwei_to_wei(gwei: Decimal) -> Option<U256> {
    let wei = gwei.checked_mul(dec!(1_000_000_000))?.trunc();
    wei.to_u128().map(U256::from)
}

fn parse_address_list(raw: &str) -> anyhow::Result<Vec<Address>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Address::from_str(s).with_context(|| format!("invalid address '{}'", s)))
        .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_amount(raw: &str) -> anyhow::Result<U256> {
    let raw = raw.trim();
    match raw.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).with_context(|| format!("invalid amount '{}'", raw)),
        None => U256::from_dec_str(raw).with_context(|| format!("invalid amount '{}'", raw)),
    }
}

impl FlashArbitrageConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// File (or defaults), then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override with environment variables if present
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(urls) = std::env::var("ARBITRAGE_RPC_URLS") {
            self.network.rpc_urls = parse_list(&urls);
        }

        if let Ok(urls) = std::env::var("ARBITRAGE_WS_URLS") {
            self.network.ws_urls = parse_list(&urls);
        }

        if let Ok(chain_id) = std::env::var("ARBITRAGE_CHAIN_ID") {
            self.network.chain_id = chain_id
                .parse()
                .context("ARBITRAGE_CHAIN_ID must be an integer")?;
        }

        if let Ok(min_profit) = std::env::var("ARBITRAGE_MIN_PROFIT_WEI") {
            self.detector.min_profit =
                parse_amount(&min_profit).context("ARBITRAGE_MIN_PROFIT_WEI")?;
        }

        if let Ok(amount) = std::env::var("ARBITRAGE_TRADE_AMOUNT_WEI") {
            self.detector.trade_amount =
                parse_amount(&amount).context("ARBITRAGE_TRADE_AMOUNT_WEI")?;
        }

        if let Ok(tokens) = std::env::var("ARBITRAGE_BASE_TOKENS") {
            self.detector.base_tokens = parse_address_list(&tokens)?;
        }

        if let Ok(max_gas) = std::env::var("ARBITRAGE_MAX_GAS_GWEI") {
            self.executor.max_gas_price_gwei = Decimal::from_str(max_gas.trim())
                .context("ARBITRAGE_MAX_GAS_GWEI must be a decimal")?;
        }

        if let Ok(contract) = std::env::var("ARBITRAGE_EXECUTOR_CONTRACT") {
            self.executor.executor_contract = Address::from_str(contract.trim())
                .context("ARBITRAGE_EXECUTOR_CONTRACT must be an address")?;
        }

        if let Ok(url) = std::env::var("ARBITRAGE_SIMULATION_URL") {
            self.executor.simulation_url = url;
        }

        if let Ok(urls) = std::env::var("ARBITRAGE_RELAY_URLS") {
            self.executor.relays = parse_list(&urls)
                .into_iter()
                .enumerate()
                .map(|(i, url)| RelayConfig {
                    name: format!("relay-{}", i),
                    url,
                })
                .collect();
        }

        if let Ok(dry_run) = std::env::var("ARBITRAGE_DRY_RUN") {
            self.executor.dry_run = dry_run.trim().eq_ignore_ascii_case("true");
        }

        if let Ok(url) = std::env::var("ARBITRAGE_TOKEN_FEED_URL") {
            self.token_feed.url = Some(url);
        }

        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        // Network
        if self.network.rpc_urls.is_empty() {
            bail!("at least one RPC URL is required");
        }
        if self.network.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be positive");
        }
        if self.network.wrapped_native.is_zero() {
            bail!("wrapped_native must be set");
        }

        // Quoting
        if self.quoting.venues.is_empty() {
            bail!("at least one quote venue is required");
        }
        if self.quoting.max_concurrent_quotes == 0 {
            bail!("max_concurrent_quotes must be positive");
        }
        for venue in &self.quoting.venues {
            venue
                .validate()
                .with_context(|| format!("invalid {} venue", venue.dex))?;
        }

        // Detector
        if self.detector.base_tokens.is_empty() {
            bail!("at least one base token is required");
        }
        if self.detector.max_hops < 2 {
            bail!("max_hops must be at least 2 to close a loop");
        }
        if self.detector.trade_amount.is_zero() {
            bail!("trade_amount must be positive");
        }
        if self.detector.slippage_bps > 10_000 {
            bail!("slippage_bps must be <= 10000 (100%)");
        }

        // Executor
        match gwei_to_wei(self.executor.max_gas_price_gwei) {
            Some(wei) if !wei.is_zero() => {}
            _ => bail!("max_gas_price_gwei must be positive"),
        }
        if gwei_to_wei(self.executor.priority_fee_gwei).is_none() {
            bail!("priority_fee_gwei must be non-negative");
        }
        if gwei_to_wei(self.executor.default_gas_price_gwei).is_none() {
            bail!("default_gas_price_gwei must be non-negative");
        }
        if self.executor.gas_limit < 21_000 {
            bail!("gas_limit must be at least 21000");
        }
        if let TipPolicy::ProfitShare { bps } = self.executor.tip {
            if bps > 10_000 {
                bail!("tip profit share must be <= 10000 bps");
            }
        }
        if self.executor.breaker_max_failures == 0 {
            bail!("breaker_max_failures must be positive");
        }
        if self.executor.rate_limit == 0 || self.executor.rate_limit_window_secs == 0 {
            bail!("rate limit and window must be positive");
        }

        // Mempool
        if self.mempool.enabled && self.network.ws_urls.is_empty() {
            bail!("mempool watching requires a WebSocket URL");
        }
        if self.mempool.dedup_capacity == 0 {
            bail!("dedup_capacity must be positive");
        }

        Ok(())
    }

    /// Extra checks before real submissions
    pub fn validate_for_submission(&self) -> anyhow::Result<()> {
        if self.executor.executor_contract.is_zero() {
            bail!("executor_contract must be set for live execution");
        }
        if self.executor.builder_payment_address.is_zero() {
            bail!("builder_payment_address must be set for live execution");
        }
        if self.executor.relays.is_empty() {
            bail!("at least one relay is required for live execution");
        }
        Ok(())
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            http_endpoints: self.network.rpc_urls.clone(),
            ws_endpoints: self.network.ws_urls.clone(),
            request_timeout: Duration::from_millis(self.network.request_timeout_ms),
            base_backoff: Duration::from_millis(self.network.base_backoff_ms),
            max_backoff: Duration::from_millis(self.network.max_backoff_ms),
            max_retries: self.network.max_reconnect_attempts,
            heartbeat_interval: Duration::from_secs(self.network.heartbeat_interval_secs),
            max_requests_per_second: self.network.max_requests_per_second,
            subscription_buffer: self.mempool.channel_capacity,
        }
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            max_failures: self.executor.breaker_max_failures,
            reset_timeout: Duration::from_secs(self.executor.breaker_reset_secs),
        }
    }

    pub fn simulation_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.executor.simulation_attempts.max(1),
            ..RetryPolicy::default()
        }
    }
}

impl VenueConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.router.is_zero() {
            bail!("router must be set");
        }
        match self.kind {
            QuoterKind::V2Router => {}
            QuoterKind::V2Pair => {
                if self.factory.is_none() {
                    bail!("v2_pair quoting needs a factory");
                }
                if self.fee_bps >= 10_000 {
                    bail!("fee_bps must be below 10000");
                }
            }
            QuoterKind::V3Quoter | QuoterKind::V3Pool => {
                if self.fee_tiers.is_empty() {
                    bail!("v3 quoting needs fee tiers");
                }
                if self.kind == QuoterKind::V3Quoter && self.quoter.is_none() {
                    bail!("v3_quoter quoting needs a quoter address");
                }
                if self.kind == QuoterKind::V3Pool && self.factory.is_none() {
                    bail!("v3_pool quoting needs a factory");
                }
            }
        }
        if self.kind.is_v3() != self.dex.is_v3() {
            bail!("{:?} quoting does not match venue {}", self.kind, self.dex);
        }
        Ok(())
    }
}

impl QuoterKind {
    pub fn is_v3(&self) -> bool {
        matches!(self, QuoterKind::V3Quoter | QuoterKind::V3Pool)
    }
}

/// Executor signing key from the environment
pub fn private_key_from_env() -> anyhow::Result<String> {
    std::env::var(PRIVATE_KEY_ENV)
        .with_context(|| format!("{} is not set", PRIVATE_KEY_ENV))
}
