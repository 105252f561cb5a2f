//! Exponential backoff and the shared retry combinator
//!
//! Delay for attempt `n` is `base × 1.5^n`, capped at `max`, with up to 25%
//! random jitter added (never past the cap).

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use types::EngineError;

use crate::NetworkError;

const BACKOFF_FACTOR: f64 = 1.5;
const JITTER_FRACTION: f64 = 0.25;

/// Errors that know whether a retry can help
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for NetworkError {
    fn is_transient(&self) -> bool {
        NetworkError::is_transient(self)
    }
}

impl Retryable for EngineError {
    fn is_transient(&self) -> bool {
        EngineError::is_transient(self)
    }
}

/// Retry behaviour for one class of operation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(crate::DEFAULT_BASE_BACKOFF_MS),
            max_delay: Duration::from_millis(crate::DEFAULT_MAX_BACKOFF_MS),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = backoff_delay(self.base_delay, attempt, self.max_delay);
        if self.jitter {
            with_jitter(delay, self.max_delay)
        } else {
            delay
        }
    }
}

/// `base × 1.5^attempt`, capped at `max`
pub fn backoff_delay(base: Duration, attempt: u32, max: Duration) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let scaled = base.as_secs_f64() * BACKOFF_FACTOR.powi(exponent);
    if !scaled.is_finite() || scaled >= max.as_secs_f64() {
        max
    } else {
        Duration::from_secs_f64(scaled)
    }
}

/// Add up to 25% random jitter without exceeding `cap`
pub fn with_jitter(delay: Duration, cap: Duration) -> Duration {
    let spread = delay.as_secs_f64() * JITTER_FRACTION;
    if spread <= 0.0 {
        return delay.min(cap);
    }
    let extra = rand::thread_rng().gen_range(0.0..=spread);
    (delay + Duration::from_secs_f64(extra)).min(cap)
}

/// Run `operation` until it succeeds, fails permanently or the policy runs out.
///
/// The closure receives the 0-based attempt number.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(error) if error.is_transient() && attempt + 1 < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {} - retrying in {:?}",
                    operation_name,
                    attempt + 1,
                    max_attempts,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
