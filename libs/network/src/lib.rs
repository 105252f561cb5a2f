//! Network Infrastructure
//!
//! Resilient connectivity for the arbitrage engine. Everything that talks to a
//! node, relay or simulation endpoint goes through this crate:
//!
//! - [`ConnectionManager`]: ordered HTTP endpoints with round-robin failover,
//!   backoff reconnection, heartbeat supervision, fallback-on-error and
//!   per-call deadlines; WebSocket subscriptions with the same policy
//! - [`ChainClient`]: typed JSON-RPC capability the rest of the engine
//!   depends on (mockable in tests)
//! - [`with_retry`]: the single retry combinator, transient errors only
//! - [`CircuitBreaker`] and [`RateLimiter`]: failure containment for the
//!   execution pipeline
//!
//! Connection state is private to [`ConnectionManager`]; callers only ever see
//! a [`HealthStatus`].

pub mod circuit_breaker;
pub mod client;
pub mod connection;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod subscription;
pub mod time;
pub mod transport;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitOpenError, CircuitState};
pub use client::ChainClient;
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, HealthStatus};
pub use error::{NetworkError, Result};
pub use rate_limit::{RateLimitExceeded, RateLimiter, RateLimiterWindow, RequestThrottle};
pub use retry::{backoff_delay, with_jitter, with_retry, RetryPolicy, Retryable};
pub use subscription::{SubscriptionFrame, SubscriptionKind};
pub use time::unix_timestamp_secs;
pub use transport::{HttpTransport, RpcTransport};

// Constants for configuration
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 8;
