//! # Flash Arbitrage Strategy - Cross-DEX Flash-Loan Arbitrage Engine
//!
//! ## Purpose
//!
//! Finds closed token loops across EVM DEX venues whose output exceeds their
//! input after gas, wraps them in a flash-loan bundle and submits the bundle
//! privately to block-builder relays. Pending swaps decoded from the mempool
//! trigger targeted back-run searches alongside the periodic scan.
//!
//! ## Integration Points
//!
//! - **Chain access**: [`network::ConnectionManager`] (failover RPC, heartbeats, subscriptions)
//! - **Quotes**: per-venue adapters behind [`QuoteAggregator`]
//! - **Calldata**: `dex` crate encoders and the mempool decoder
//! - **Submission**: `mev` crate signer, simulator and relay clients
//! - **Telemetry**: [`events::EventSink`] plus structured tracing
//!
//! ## Architecture Role
//!
//! ```mermaid
//! graph LR
//!     Tick[Scan Ticker] --> Explorer[Route Explorer]
//!     Mempool[Mempool Watcher] --> Explorer
//!     Explorer --> Orchestrator[Bundle Orchestrator]
//!     Orchestrator --> Pipeline[Execution Pipeline]
//!     Pipeline --> Relays[Builder Relays]
//!
//!     subgraph "Quoting"
//!         Aggregator[Quote Aggregator<br/>V2 / V3 adapters]
//!     end
//!
//!     subgraph "Guards"
//!         Breaker[Circuit Breakers]
//!         Limiter[Rate Limiter]
//!     end
//!
//!     Aggregator --> Explorer
//!     Breaker --> Pipeline
//!     Limiter --> Pipeline
//! ```
//!
//! ## Execution Flow
//!
//! 1. Health gate: no work while the connection layer is `Critical`
//! 2. Sign the bundle transaction against the current nonce and gas price
//! 3. Simulate, victim transaction first when back-running
//! 4. Validate profit net of gas and tip against the floor
//! 5. Submit to every relay for the next block and track inclusion

pub mod config;
pub mod events;
pub mod explorer;
pub mod gas_price;
pub mod logging;
pub mod mempool;
pub mod orchestrator;
pub mod pipeline;
pub mod quoting;
pub mod strategy_engine;
pub mod tokens;

#[cfg(test)]
mod test_support;

pub use config::{DetectorConfig, ExecutorConfig, FlashArbitrageConfig};
pub use events::{ChannelEventSink, EngineEvent, EventSink, TracingEventSink};
pub use explorer::{ExplorerConfig, RouteExplorer};
pub use gas_price::{FixedGasPrice, GasOracle, GasPriceFetcher};
pub use mempool::{MempoolWatcher, PendingSwap};
pub use orchestrator::{BundleOrchestrator, BundleSource, FlashLoanSpec, OrchestratorConfig, TipPolicy};
pub use pipeline::{ExecutionPipeline, ExecutionReport, ExecutionStage, Opportunity, PipelineConfig};
pub use quoting::{DexQuoter, QuoteAggregator, QuoteSource};
pub use strategy_engine::{StrategyConfig, StrategyEngine};
pub use tokens::TokenFeed;

pub use rust_decimal::Decimal;
