//! Circuit breaker pattern for fault tolerance
//!
//! Closed → Open after `max_failures` consecutive failures. While open every
//! call is rejected with [`CircuitOpenError`] without invoking the operation.
//! Once `reset_timeout` has elapsed exactly one probe call is let through:
//! success closes the breaker, failure re-opens it and restarts the timer.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use types::EngineError;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failing - requests are rejected
    Open,
    /// Reset timeout elapsed - a single probe is in flight or allowed
    HalfOpen,
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub max_failures: u32,
    /// Time to wait before letting a probe through
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Returned when the breaker rejects a call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("circuit breaker '{operation}' is open")]
pub struct CircuitOpenError {
    pub operation: String,
}

impl From<CircuitOpenError> for EngineError {
    fn from(error: CircuitOpenError) -> Self {
        EngineError::CircuitOpen {
            operation: error.operation,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    phase: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

/// Thread-safe circuit breaker guarding one named operation
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,

    // Metrics
    total_rejections: AtomicU64,
    circuit_opens: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState {
                phase: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
            total_rejections: AtomicU64::new(0),
            circuit_opens: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.state.lock().phase
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    pub fn total_rejections(&self) -> u64 {
        self.total_rejections.load(Ordering::Relaxed)
    }

    pub fn circuit_opens(&self) -> u64 {
        self.circuit_opens.load(Ordering::Relaxed)
    }

    /// Execute an operation through the circuit breaker.
    ///
    /// Every `Err` returned by the operation counts as a failure.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        let admission = self.admit().map_err(E::from)?;
        let mut guard = ProbeGuard {
            breaker: self,
            armed: admission == Admission::Probe,
        };

        let result = operation().await;
        guard.armed = false;

        match &result {
            Ok(_) => self.on_success(admission),
            Err(_) => self.on_failure(admission),
        }
        result
    }

    fn admit(&self) -> Result<Admission, CircuitOpenError> {
        let mut state = self.state.lock();
        match state.phase {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = state
                    .last_failure
                    .map(|at| at.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    state.phase = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    tracing::info!("Circuit breaker '{}' half-open, probing", self.name);
                    Ok(Admission::Probe)
                } else {
                    drop(state);
                    Err(self.reject())
                }
            }
            CircuitState::HalfOpen if !state.probe_in_flight => {
                state.probe_in_flight = true;
                Ok(Admission::Probe)
            }
            CircuitState::HalfOpen => {
                drop(state);
                Err(self.reject())
            }
        }
    }

    fn reject(&self) -> CircuitOpenError {
        self.total_rejections.fetch_add(1, Ordering::Relaxed);
        CircuitOpenError {
            operation: self.name.clone(),
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut state = self.state.lock();
        match (admission, state.phase) {
            (Admission::Probe, _) => {
                state.phase = CircuitState::Closed;
                state.consecutive_failures = 0;
                state.probe_in_flight = false;
                tracing::info!("Circuit breaker '{}' closed after successful probe", self.name);
            }
            (Admission::Normal, CircuitState::Closed) => {
                state.consecutive_failures = 0;
            }
            // Straggler admitted before the circuit opened
            (Admission::Normal, _) => {}
        }
    }

    fn on_failure(&self, admission: Admission) {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        match (admission, state.phase) {
            (Admission::Probe, _) => {
                state.phase = CircuitState::Open;
                state.last_failure = Some(Instant::now());
                state.probe_in_flight = false;
                self.circuit_opens.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Circuit breaker '{}' probe failed, re-opening", self.name);
            }
            (Admission::Normal, CircuitState::Closed)
                if state.consecutive_failures >= self.config.max_failures =>
            {
                state.phase = CircuitState::Open;
                state.last_failure = Some(Instant::now());
                self.circuit_opens.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Circuit breaker '{}' opened after {} consecutive failures",
                    self.name,
                    state.consecutive_failures
                );
            }
            _ => {}
        }
    }
}

/// Releases the probe slot if the probing future is dropped before completing
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.state.lock().probe_in_flight = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn breaker(max_failures: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "validate",
            CircuitBreakerConfig {
                max_failures,
                reset_timeout: Duration::from_millis(reset_ms),
            },
        )
    }

    async fn fail(cb: &CircuitBreaker, invoked: &AtomicU32) -> Result<(), EngineError> {
        cb.call(|| async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Err::<(), EngineError>(EngineError::network("boom"))
        })
        .await
    }

    async fn succeed(cb: &CircuitBreaker, invoked: &AtomicU32) -> Result<(), EngineError> {
        cb.call(|| async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok::<(), EngineError>(())
        })
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_max_failures_without_invoking() {
        let cb = breaker(3, 1_000);
        let invoked = AtomicU32::new(0);

        for _ in 0..3 {
            assert!(matches!(
                fail(&cb, &invoked).await,
                Err(EngineError::Network { .. })
            ));
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(invoked.load(Ordering::SeqCst), 3);

        let err = succeed(&cb, &invoked).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::CircuitOpen {
                operation: "validate".into()
            }
        );
        assert_eq!(invoked.load(Ordering::SeqCst), 3);
        assert_eq!(cb.total_rejections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_count() {
        let cb = breaker(3, 1_000);
        let invoked = AtomicU32::new(0);

        let _ = fail(&cb, &invoked).await;
        let _ = fail(&cb, &invoked).await;
        succeed(&cb, &invoked).await.unwrap();
        let _ = fail(&cb, &invoked).await;
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_success_closes() {
        let cb = breaker(2, 1_000);
        let invoked = AtomicU32::new(0);
        let _ = fail(&cb, &invoked).await;
        let _ = fail(&cb, &invoked).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1_001)).await;
        succeed(&cb, &invoked).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens_and_resets_timer() {
        let cb = breaker(2, 1_000);
        let invoked = AtomicU32::new(0);
        let _ = fail(&cb, &invoked).await;
        let _ = fail(&cb, &invoked).await;

        tokio::time::advance(Duration::from_millis(1_001)).await;
        let _ = fail(&cb, &invoked).await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(invoked.load(Ordering::SeqCst), 3);

        // Timer restarted at the probe failure
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(matches!(
            succeed(&cb, &invoked).await,
            Err(EngineError::CircuitOpen { .. })
        ));
        assert_eq!(invoked.load(Ordering::SeqCst), 3);

        tokio::time::advance(Duration::from_millis(501)).await;
        succeed(&cb, &invoked).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_probe_while_half_open() {
        let cb = breaker(1, 100);
        let invoked = AtomicU32::new(0);
        let _ = fail(&cb, &invoked).await;
        tokio::time::advance(Duration::from_millis(101)).await;

        let (probe, concurrent) = tokio::join!(
            cb.call(|| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<(), EngineError>(())
            }),
            async {
                tokio::task::yield_now().await;
                succeed(&cb, &invoked).await
            }
        );
        assert!(probe.is_ok());
        assert!(matches!(concurrent, Err(EngineError::CircuitOpen { .. })));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_releases_slot() {
        let cb = breaker(1, 100);
        let invoked = AtomicU32::new(0);
        let _ = fail(&cb, &invoked).await;
        tokio::time::advance(Duration::from_millis(101)).await;

        let probe = cb.call(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<(), EngineError>(())
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), probe).await;
        assert!(timed_out.is_err());

        succeed(&cb, &invoked).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
