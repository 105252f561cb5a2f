//! Rate limiting for outbound requests
//!
//! Two limiters with different jobs:
//! - [`RateLimiter`]: fixed-window counter per named operation (`validate`,
//!   `submit`); the window resets once `now > window_reset`
//! - [`RequestThrottle`]: smooth requests-per-second throttle for JSON-RPC
//!   endpoints, backed by `governor`

use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use types::EngineError;

/// Returned when the current window is exhausted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("rate limit exceeded for '{operation}': {limit} calls per window")]
pub struct RateLimitExceeded {
    pub operation: String,
    pub limit: u32,
}

impl From<RateLimitExceeded> for EngineError {
    fn from(error: RateLimitExceeded) -> Self {
        EngineError::RateLimited {
            operation: error.operation,
            limit: error.limit,
        }
    }
}

/// Per-operation window state
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterWindow {
    pub count: u32,
    pub window_reset: Instant,
}

/// Fixed-window rate limiter keyed by operation name
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, RateLimiterWindow>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one call against `operation`, or reject if the window is full
    pub fn try_acquire(&self, operation: &str) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(operation.to_string())
            .or_insert(RateLimiterWindow {
                count: 0,
                window_reset: now + self.window,
            });

        if now > entry.window_reset {
            entry.count = 0;
            entry.window_reset = now + self.window;
        }

        if entry.count >= self.limit {
            tracing::debug!(
                "Rate limit hit for '{}' ({} per {:?})",
                operation,
                self.limit,
                self.window
            );
            return Err(RateLimitExceeded {
                operation: operation.to_string(),
                limit: self.limit,
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Snapshot of an operation's window
    pub fn window(&self, operation: &str) -> Option<RateLimiterWindow> {
        self.windows.get(operation).map(|entry| *entry)
    }
}

/// Requests-per-second throttle for one connection
pub struct RequestThrottle {
    limiter: DefaultDirectRateLimiter,
    per_second: u32,
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("per_second", &self.per_second)
            .finish()
    }
}

impl RequestThrottle {
    /// `None` when `per_second` is zero (unthrottled)
    pub fn per_second(per_second: u32) -> Option<Self> {
        let rate = NonZeroU32::new(per_second)?;
        Some(Self {
            limiter: DefaultDirectRateLimiter::direct(Quota::per_second(rate)),
            per_second,
        })
    }

    /// Wait until a request is allowed
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }

    /// Non-blocking check
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
