//! Bundle simulation service client
//!
//! POST `{transactions, network_id, block_number}` and receive
//! `{success, gas_used, error?, simulation_url?, balance_delta?}`. A reverted
//! simulation (`success: false`) or a rejected request aborts the opportunity
//! and is never retried. Connection failures, timeouts and 5xx/429 replies are
//! `Network` errors, transient for the caller's retry policy.

use async_trait::async_trait;
use ethers::types::{Bytes, U256};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use types::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationRequest {
    pub transactions: Vec<Bytes>,
    pub network_id: u64,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationOutcome {
    pub success: bool,
    #[serde(default)]
    pub gas_used: u64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub simulation_url: Option<String>,
    /// Executor balance change of the base token, decimal or `0x` hex,
    /// optionally negative
    #[serde(default)]
    pub balance_delta: Option<String>,
}

impl SimulationOutcome {
    /// Simulated gain in base-token units; losses clamp to zero
    pub fn profit(&self) -> Option<U256> {
        let raw = self.balance_delta.as_deref()?.trim();
        if raw.starts_with('-') {
            return Some(U256::zero());
        }
        let raw = raw.trim_start_matches('+');
        match raw.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_dec_str(raw).ok(),
        }
    }
}

#[async_trait]
pub trait BundleSimulator: Send + Sync {
    /// Successful outcome, `SimulationFailure` when the bundle reverts or the
    /// request is refused, `Network` when the service cannot be reached
    async fn simulate(&self, request: &SimulationRequest) -> EngineResult<SimulationOutcome>;
}

pub struct SimulationClient {
    url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl SimulationClient {
    pub fn new(url: impl Into<String>, http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            http,
            timeout,
        }
    }
}

fn failure(reason: impl Into<String>, gas_used: Option<u64>) -> EngineError {
    EngineError::SimulationFailure {
        reason: reason.into(),
        gas_used,
    }
}

#[async_trait]
impl BundleSimulator for SimulationClient {
    async fn simulate(&self, request: &SimulationRequest) -> EngineResult<SimulationOutcome> {
        let response = self
            .http
            .post(&self.url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::network(format!("simulation timed out after {:?}", self.timeout))
                } else {
                    EngineError::network(format!("simulation request: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = format!("HTTP {}: {}", status, body);
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                EngineError::network(reason)
            } else {
                failure(reason, None)
            });
        }

        let outcome: SimulationOutcome = response.json().await.map_err(|e| {
            if e.is_decode() {
                EngineError::ProtocolDecode {
                    reason: format!("invalid simulation reply: {}", e),
                }
            } else {
                EngineError::network(format!("reading simulation reply: {}", e))
            }
        })?;

        if !outcome.success {
            let reason = outcome
                .error
                .clone()
                .unwrap_or_else(|| "simulation reverted".to_string());
            return Err(failure(reason, Some(outcome.gas_used)));
        }

        debug!(
            "🧪 Simulation ok: gas {} ({})",
            outcome.gas_used,
            outcome.simulation_url.as_deref().unwrap_or("no url")
        );
        Ok(outcome)
    }
}
