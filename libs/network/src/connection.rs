//! # Connection Manager - Resilient JSON-RPC Access
//!
//! ## Purpose
//!
//! Owns the ordered list of node endpoints (primary first, then fallbacks) and
//! hides every connectivity concern from the rest of the engine. Callers issue
//! `call(method, params)` and get a value or a typed error; endpoint rotation,
//! reconnection and health live here.
//!
//! ## Failure Handling
//!
//! - **Fallback-on-error**: a transport failure or timeout on the active
//!   endpoint is retried once against the next endpoint, transparently
//! - **Round-robin rotation**: the failed endpoint is abandoned and the next
//!   one becomes active
//! - **Reconnection**: the supervisor probes the active endpoint with
//!   exponential backoff (`base × 1.5^attempt`, capped, jittered)
//! - **Critical health**: after `max_retries` failed probes health becomes
//!   [`HealthStatus::Critical`]; the process keeps running and the heartbeat
//!   keeps probing so connectivity can recover on its own
//! - **JSON-RPC errors** (the node answered) never trigger failover
//!
//! ## Architecture Role
//!
//! ```text
//! Quote adapters ─┐
//! Mempool watcher ├─→ [ChainClient] → [ConnectionManager] → endpoint[i]
//! Pipeline ───────┘                        ↑      ↓ failure
//!                                   [Supervisor: heartbeat + backoff]
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::rate_limit::RequestThrottle;
use crate::retry::{backoff_delay, with_jitter};
use crate::transport::{HttpTransport, RpcTransport};
use crate::{NetworkError, Result};

/// Configuration for connection management
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// HTTP JSON-RPC endpoints, primary first
    pub http_endpoints: Vec<String>,
    /// WebSocket endpoints for subscriptions, primary first
    pub ws_endpoints: Vec<String>,
    /// Deadline for every outbound call
    pub request_timeout: Duration,
    /// Base backoff time for reconnection
    pub base_backoff: Duration,
    /// Maximum backoff time
    pub max_backoff: Duration,
    /// Reconnection attempts before health becomes critical
    pub max_retries: u32,
    /// Heartbeat probe interval
    pub heartbeat_interval: Duration,
    /// Outbound requests per second, `None` for unthrottled
    pub max_requests_per_second: Option<u32>,
    /// Buffered notifications per subscription
    pub subscription_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            http_endpoints: Vec::new(),
            ws_endpoints: Vec::new(),
            request_timeout: Duration::from_millis(crate::DEFAULT_REQUEST_TIMEOUT_MS),
            base_backoff: Duration::from_millis(crate::DEFAULT_BASE_BACKOFF_MS),
            max_backoff: Duration::from_millis(crate::DEFAULT_MAX_BACKOFF_MS),
            max_retries: crate::DEFAULT_MAX_RETRIES,
            heartbeat_interval: Duration::from_secs(crate::DEFAULT_HEARTBEAT_INTERVAL_SECS),
            max_requests_per_second: None,
            subscription_buffer: 4_096,
        }
    }
}

/// Connectivity health as seen by the rest of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Reconnecting { attempt: u32 },
    /// Reconnection attempts exhausted; submissions must stop
    Critical,
}

impl HealthStatus {
    pub fn allows_submission(&self) -> bool {
        !matches!(self, HealthStatus::Critical)
    }
}

/// Endpoint bookkeeping, private to the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub current_endpoint_index: usize,
    pub reconnect_attempts: u32,
    pub is_connected: bool,
}

/// JSON-RPC connection manager with failover and supervision
pub struct ConnectionManager {
    config: ConnectionConfig,
    transports: Vec<Arc<dyn RpcTransport>>,
    state: Mutex<ConnectionState>,
    health: watch::Sender<HealthStatus>,
    reconnect_signal: Notify,
    throttle: Option<RequestThrottle>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoints", &self.transports.len())
            .field("state", &*self.state.lock())
            .field("health", &self.health())
            .finish()
    }
}

impl ConnectionManager {
    /// Build HTTP transports for every configured endpoint
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let client = HttpTransport::pooled_client(config.request_timeout)?;
        let transports = config
            .http_endpoints
            .iter()
            .map(|endpoint| {
                HttpTransport::new(endpoint, client.clone())
                    .map(|t| Arc::new(t) as Arc<dyn RpcTransport>)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::with_transports(config, transports)
    }

    /// Build from explicit transports, in priority order
    pub fn with_transports(
        config: ConnectionConfig,
        transports: Vec<Arc<dyn RpcTransport>>,
    ) -> Result<Self> {
        if transports.is_empty() {
            return Err(NetworkError::configuration(
                "at least one RPC endpoint is required",
            ));
        }

        let throttle = config
            .max_requests_per_second
            .and_then(RequestThrottle::per_second);
        let (health, _) = watch::channel(HealthStatus::Healthy);

        info!(
            "🌐 Connection manager ready: {} RPC endpoint(s), {} WS endpoint(s)",
            transports.len(),
            config.ws_endpoints.len()
        );

        Ok(Self {
            config,
            transports,
            state: Mutex::new(ConnectionState {
                current_endpoint_index: 0,
                reconnect_attempts: 0,
                is_connected: true,
            }),
            health,
            reconnect_signal: Notify::new(),
            throttle,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn health(&self) -> HealthStatus {
        *self.health.borrow()
    }

    /// Watch health transitions
    pub fn subscribe_health(&self) -> watch::Receiver<HealthStatus> {
        self.health.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().clone()
    }

    pub fn active_endpoint(&self) -> String {
        let index = self.state.lock().current_endpoint_index;
        self.transports[index].endpoint().to_string()
    }

    /// Issue a JSON-RPC call against the active endpoint, falling back once
    /// to the next endpoint on transport failure
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        if let Some(throttle) = &self.throttle {
            throttle.until_ready().await;
        }

        let index = self.state.lock().current_endpoint_index;
        match self.call_endpoint(index, method, params.clone()).await {
            Ok(value) => {
                self.mark_endpoint_healthy(index);
                Ok(value)
            }
            Err(e) if e.is_endpoint_failure() => {
                let backup = self.mark_endpoint_failed(index, &e);
                if backup == index {
                    return Err(e);
                }

                debug!(
                    "Retrying {} against backup endpoint {}",
                    method,
                    self.transports[backup].endpoint()
                );
                match self.call_endpoint(backup, method, params).await {
                    Ok(value) => {
                        self.mark_endpoint_healthy(backup);
                        Ok(value)
                    }
                    Err(backup_err) => {
                        if backup_err.is_endpoint_failure() {
                            self.mark_endpoint_failed(backup, &backup_err);
                        }
                        Err(backup_err)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn call_endpoint(&self, index: usize, method: &str, params: Value) -> Result<Value> {
        let transport = &self.transports[index];
        match timeout(self.config.request_timeout, transport.request(method, params)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::timeout(method, self.config.request_timeout)),
        }
    }

    /// Abandon a failed endpoint, rotate and wake the supervisor.
    /// Returns the index now active.
    fn mark_endpoint_failed(&self, index: usize, error: &NetworkError) -> usize {
        let (active, attempts) = {
            let mut state = self.state.lock();
            if state.current_endpoint_index == index {
                state.current_endpoint_index = (index + 1) % self.transports.len();
            }
            state.is_connected = false;
            (state.current_endpoint_index, state.reconnect_attempts)
        };

        warn!(
            "⚠️ Endpoint {} failed: {} - switching to {}",
            self.transports[index].endpoint(),
            error,
            self.transports[active].endpoint()
        );

        if self.health() != HealthStatus::Critical {
            self.set_health(HealthStatus::Reconnecting {
                attempt: attempts + 1,
            });
        }
        self.reconnect_signal.notify_one();
        active
    }

    fn mark_endpoint_healthy(&self, index: usize) {
        let restored = {
            let mut state = self.state.lock();
            let restored = !state.is_connected || state.reconnect_attempts > 0;
            state.current_endpoint_index = index;
            state.is_connected = true;
            state.reconnect_attempts = 0;
            restored
        };
        if restored {
            info!(
                "✅ Connectivity restored via {}",
                self.transports[index].endpoint()
            );
        }
        self.set_health(HealthStatus::Healthy);
    }

    fn set_health(&self, status: HealthStatus) {
        self.health.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    async fn probe(&self, index: usize) -> Result<()> {
        self.call_endpoint(index, "eth_blockNumber", Value::Array(Vec::new()))
            .await
            .map(|_| ())
    }

    /// Spawn the heartbeat/reconnection supervisor
    pub fn spawn_supervisor(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.supervise().await })
    }

    async fn supervise(self: Arc<Self>) {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let index = self.state.lock().current_endpoint_index;
                    match self.probe(index).await {
                        Ok(()) => {
                            self.mark_endpoint_healthy(index);
                            continue;
                        }
                        Err(e) => {
                            warn!("💔 Heartbeat failed on {}: {}", self.transports[index].endpoint(), e);
                            self.mark_endpoint_failed(index, &e);
                        }
                    }
                }
                _ = self.reconnect_signal.notified() => {}
            }
            self.reconnect().await;
        }
    }

    /// Probe with backoff until connected or retries are exhausted
    async fn reconnect(&self) {
        loop {
            let (index, attempt) = {
                let mut state = self.state.lock();
                if state.is_connected {
                    return;
                }
                state.reconnect_attempts = state.reconnect_attempts.saturating_add(1);
                (state.current_endpoint_index, state.reconnect_attempts)
            };

            if attempt > self.config.max_retries {
                if self.health() != HealthStatus::Critical {
                    error!(
                        "❌ Connectivity critical: {} reconnection attempts exhausted",
                        self.config.max_retries
                    );
                }
                self.set_health(HealthStatus::Critical);
                return;
            }

            self.set_health(HealthStatus::Reconnecting { attempt });
            let delay = with_jitter(
                backoff_delay(self.config.base_backoff, attempt - 1, self.config.max_backoff),
                self.config.max_backoff,
            );
            info!(
                "🔄 Reconnecting to {} in {:?} (attempt {}/{})",
                self.transports[index].endpoint(),
                delay,
                attempt,
                self.config.max_retries
            );
            tokio::time::sleep(delay).await;

            match self.probe(index).await {
                Ok(()) => {
                    self.mark_endpoint_healthy(index);
                    return;
                }
                Err(e) => {
                    let mut state = self.state.lock();
                    if state.current_endpoint_index == index {
                        state.current_endpoint_index = (index + 1) % self.transports.len();
                    }
                    drop(state);
                    warn!(
                        "Reconnection probe to {} failed: {}",
                        self.transports[index].endpoint(),
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Transport that fails while `down` is set
    #[derive(Debug)]
    struct ScriptedTransport {
        name: String,
        down: AtomicBool,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(name: &str, down: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                down: AtomicBool::new(down),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        fn endpoint(&self) -> &str {
            &self.name
        }

        async fn request(&self, method: &str, _params: Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(NetworkError::transport(&self.name, "connection refused"));
            }
            if method == "eth_call" {
                return Err(NetworkError::Rpc {
                    code: 3,
                    message: "execution reverted".into(),
                });
            }
            Ok(Value::String(self.name.clone()))
        }
    }

    fn config(max_retries: u32) -> ConnectionConfig {
        ConnectionConfig {
            http_endpoints: vec!["primary".into(), "backup".into()],
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            heartbeat_interval: Duration::from_secs(1),
            max_retries,
            ..ConnectionConfig::default()
        }
    }

    fn manager(
        primary: &Arc<ScriptedTransport>,
        backup: &Arc<ScriptedTransport>,
        max_retries: u32,
    ) -> Arc<ConnectionManager> {
        let transports: Vec<Arc<dyn RpcTransport>> = vec![primary.clone(), backup.clone()];
        Arc::new(ConnectionManager::with_transports(config(max_retries), transports).unwrap())
    }

    #[test]
    fn test_requires_an_endpoint() {
        assert!(ConnectionManager::with_transports(config(3), Vec::new()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_on_error_is_transparent() {
        let primary = ScriptedTransport::new("primary", true);
        let backup = ScriptedTransport::new("backup", false);
        let manager = manager(&primary, &backup, 3);

        let value = manager.call("eth_blockNumber", Value::Array(vec![])).await.unwrap();
        assert_eq!(value, Value::String("backup".into()));
        assert_eq!(manager.state().current_endpoint_index, 1);
        assert_eq!(manager.health(), HealthStatus::Healthy);

        // Subsequent calls go straight to the new active endpoint
        manager.call("eth_blockNumber", Value::Array(vec![])).await.unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rpc_errors_do_not_fail_over() {
        let primary = ScriptedTransport::new("primary", false);
        let backup = ScriptedTransport::new("backup", false);
        let manager = manager(&primary, &backup, 3);

        let err = manager.call("eth_call", Value::Array(vec![])).await.unwrap_err();
        assert!(matches!(err, NetworkError::Rpc { code: 3, .. }));
        assert_eq!(manager.state().current_endpoint_index, 0);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_endpoints_down_surfaces_error() {
        let primary = ScriptedTransport::new("primary", true);
        let backup = ScriptedTransport::new("backup", true);
        let manager = manager(&primary, &backup, 3);

        let err = manager.call("eth_gasPrice", Value::Array(vec![])).await.unwrap_err();
        assert!(err.is_endpoint_failure());
        assert!(!manager.state().is_connected);
        assert!(matches!(manager.health(), HealthStatus::Reconnecting { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_after_max_retries_then_recovers() {
        let primary = ScriptedTransport::new("primary", true);
        let backup = ScriptedTransport::new("backup", true);
        let manager = manager(&primary, &backup, 2);
        let supervisor = manager.spawn_supervisor();

        // Initial heartbeat fails, reconnection exhausts its two attempts
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(manager.health(), HealthStatus::Critical);
        assert!(!manager.health().allows_submission());

        // The heartbeat keeps probing and restores health
        backup.down.store(false, Ordering::SeqCst);
        primary.down.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(manager.health(), HealthStatus::Healthy);
        assert_eq!(manager.state().reconnect_attempts, 0);

        supervisor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_endpoint_times_out() {
        #[derive(Debug)]
        struct Slow;

        #[async_trait]
        impl RpcTransport for Slow {
            fn endpoint(&self) -> &str {
                "slow"
            }

            async fn request(&self, _method: &str, _params: Value) -> Result<Value> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Value::Null)
            }
        }

        let manager = ConnectionManager::with_transports(
            ConnectionConfig {
                request_timeout: Duration::from_millis(100),
                ..ConnectionConfig::default()
            },
            vec![Arc::new(Slow)],
        )
        .unwrap();
        let err = manager.call("eth_blockNumber", Value::Array(vec![])).await.unwrap_err();
        assert!(matches!(err, NetworkError::Timeout { .. }));
    }
}
