use anyhow::{Context, Result};
use clap::Parser;
use ethers::signers::LocalWallet;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use dex::registry::RouterRegistry;
use dex::MempoolDecoder;
use flash_arbitrage::config::{
    gwei_to_wei, private_key_from_env, FlashArbitrageConfig, RELAY_AUTH_KEY_ENV,
};
use flash_arbitrage::logging::init_logging;
use flash_arbitrage::quoting::build_quoters;
use flash_arbitrage::{
    BundleOrchestrator, EngineEvent, EventSink, ExecutionPipeline, ExplorerConfig, GasPriceFetcher,
    MempoolWatcher, OrchestratorConfig, PipelineConfig, QuoteSource, RouteExplorer, StrategyConfig,
    StrategyEngine, TokenFeed, TracingEventSink,
};
use mev::{BundleRelay, BundleSimulator, RelayClient, SimulationClient, TransactionSigner};
use network::{ChainClient, ConnectionManager, SubscriptionKind};

#[derive(Parser, Debug)]
#[command(name = "flash_arbitrage", about = "Cross-DEX flash-loan arbitrage engine")]
struct Args {
    /// JSON configuration file; defaults plus environment overrides when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulate and validate without submitting bundles
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    json_logs: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn gwei(value: rust_decimal::Decimal, field: &str) -> Result<ethers::types::U256> {
    gwei_to_wei(value).with_context(|| format!("{} is not a valid gwei amount", field))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    info!("🚀 Starting Flash Arbitrage Service...");

    let mut config = FlashArbitrageConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if args.dry_run {
        config.executor.dry_run = true;
    }
    if config.executor.dry_run {
        warn!("Dry run: bundles are simulated and validated but never submitted");
    } else {
        config.validate_for_submission()?;
    }

    // Connection layer
    let connection = Arc::new(ConnectionManager::new(config.connection_config())?);
    let _supervisor = connection.spawn_supervisor();
    let chain: Arc<dyn ChainClient> = connection.clone();
    info!("✅ Connection manager on {}", connection.active_endpoint());

    let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);
    {
        let mut health = connection.subscribe_health();
        let events = Arc::clone(&events);
        tokio::spawn(async move {
            while health.changed().await.is_ok() {
                let status = *health.borrow();
                events.record(EngineEvent::HealthChanged {
                    status: format!("{:?}", status),
                });
            }
        });
    }

    let gas = Arc::new(GasPriceFetcher::new(
        chain.clone(),
        Duration::from_secs(config.executor.gas_price_cache_secs),
        gwei(config.executor.default_gas_price_gwei, "default_gas_price_gwei")?,
    ));

    // Quoting and route search
    let aggregator = build_quoters(&config.quoting, chain.clone());
    info!("✅ Quote aggregator with {} venues", aggregator.len());
    let quotes: Arc<dyn QuoteSource> = Arc::new(aggregator);

    let explorer = Arc::new(RouteExplorer::new(
        quotes.clone(),
        gas.clone(),
        ExplorerConfig {
            min_profit: config.detector.min_profit,
            base_gas: config.detector.base_gas,
            wrapped_native: config.network.wrapped_native,
        },
    ));

    let routers: HashMap<_, _> = config
        .quoting
        .venues
        .iter()
        .map(|venue| (venue.dex, venue.router))
        .collect();
    let orchestrator = Arc::new(BundleOrchestrator::new(OrchestratorConfig {
        executor: config.executor.executor_contract,
        builder_payment: config.executor.builder_payment_address,
        tip: config.executor.tip,
        slippage_bps: config.detector.slippage_bps,
        deadline_secs: config.executor.deadline_secs,
        routers,
    }));

    // Signing, simulation and relays
    let signer = if config.executor.dry_run {
        match private_key_from_env() {
            Ok(key) => TransactionSigner::from_private_key(&key, config.network.chain_id)?,
            Err(_) => TransactionSigner::new(
                LocalWallet::new(&mut rand::thread_rng()),
                config.network.chain_id,
            ),
        }
    } else {
        TransactionSigner::from_private_key(&private_key_from_env()?, config.network.chain_id)?
    };
    info!("✅ Executor signer {:?}", signer.address());

    let http = reqwest::Client::new();
    let simulator: Arc<dyn BundleSimulator> = Arc::new(SimulationClient::new(
        config.executor.simulation_url.clone(),
        http.clone(),
        Duration::from_millis(config.executor.simulation_timeout_ms),
    ));

    let relay_auth: LocalWallet = match std::env::var(RELAY_AUTH_KEY_ENV) {
        Ok(key) => key
            .trim_start_matches("0x")
            .parse()
            .with_context(|| format!("{} is not a valid key", RELAY_AUTH_KEY_ENV))?,
        Err(_) => LocalWallet::new(&mut rand::thread_rng()),
    };
    let relays: Vec<Arc<dyn BundleRelay>> = config
        .executor
        .relays
        .iter()
        .map(|relay| {
            Arc::new(RelayClient::new(
                relay.name.clone(),
                relay.url.clone(),
                http.clone(),
                relay_auth.clone(),
                Duration::from_millis(config.executor.relay_timeout_ms),
            )) as Arc<dyn BundleRelay>
        })
        .collect();
    info!("✅ {} builder relays configured", relays.len());

    let pipeline = Arc::new(ExecutionPipeline::new(
        chain.clone(),
        Arc::new(signer),
        simulator,
        relays,
        quotes.clone(),
        gas,
        events.clone(),
        PipelineConfig {
            executor: config.executor.executor_contract,
            chain_id: config.network.chain_id,
            gas_limit: config.executor.gas_limit,
            max_gas_price: gwei(config.executor.max_gas_price_gwei, "max_gas_price_gwei")?,
            priority_fee: gwei(config.executor.priority_fee_gwei, "priority_fee_gwei")?,
            min_profit: config.detector.min_profit,
            wrapped_native: config.network.wrapped_native,
            dry_run: config.executor.dry_run,
            inclusion_blocks: config.executor.inclusion_blocks,
            inclusion_poll: Duration::from_millis(config.executor.inclusion_poll_ms),
            bundle_validity_secs: config.executor.deadline_secs,
            breaker: config.breaker_config(),
            rate_limit: config.executor.rate_limit,
            rate_limit_window: Duration::from_secs(config.executor.rate_limit_window_secs),
            simulation_retry: config.simulation_retry(),
        },
    ));

    // Token universe
    let token_feed = match &config.token_feed.url {
        Some(url) => {
            let feed = Arc::new(TokenFeed::new(
                http.clone(),
                url.clone(),
                config.token_feed.top_n,
                Duration::from_millis(config.token_feed.timeout_ms),
            ));
            feed.clone()
                .spawn_refresh(Duration::from_secs(config.token_feed.refresh_secs));
            info!("✅ Token feed refreshing every {}s", config.token_feed.refresh_secs);
            Some(feed)
        }
        None => None,
    };

    // Mempool intake
    let pending = if config.mempool.enabled && !config.network.ws_urls.is_empty() {
        let kind = if config.mempool.full_bodies {
            SubscriptionKind::NewPendingTransactionBodies
        } else {
            SubscriptionKind::NewPendingTransactions
        };
        let notifications = connection.subscribe(kind)?;
        let watcher = Arc::new(MempoolWatcher::new(
            chain.clone(),
            MempoolDecoder::new(RouterRegistry::mainnet(), config.network.wrapped_native),
            config.mempool.dedup_capacity,
            config.mempool.max_concurrent_fetches,
            events.clone(),
        ));
        let (swap_tx, swap_rx) = mpsc::channel(config.mempool.channel_capacity.max(1));
        watcher.spawn(notifications, swap_tx);
        info!("📡 Watching the mempool for router swaps");
        Some(swap_rx)
    } else {
        info!("Mempool watching disabled; periodic scans only");
        None
    };

    let engine = Arc::new(StrategyEngine::new(
        explorer,
        orchestrator,
        pipeline,
        quotes,
        token_feed,
        events,
        StrategyConfig {
            base_tokens: config.detector.base_tokens.clone(),
            candidate_tokens: config.detector.candidate_tokens.clone(),
            trade_amount: config.detector.trade_amount,
            max_hops: config.detector.max_hops,
            scan_interval: Duration::from_millis(config.detector.scan_interval_ms),
            flash_loan_provider: config.executor.flash_loan_provider,
            flash_loan_token: config.executor.flash_loan_token,
            wrapped_native: config.network.wrapped_native,
        },
    ));
    info!("✅ Flash Arbitrage Service initialized successfully");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(engine.run(pending, shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    runner
        .await
        .context("Strategy engine task panicked")?
        .context("Strategy engine failed")?;
    Ok(())
}
