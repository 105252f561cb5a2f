//! Error taxonomy for the arbitrage engine
//!
//! Every component reports through [`EngineError`]. Quote and decode paths
//! contain their failures locally and turn them into "no result"; the
//! execution pipeline surfaces them to the caller with context.

use ethers::types::U256;
use thiserror::Error;

/// Result alias used across the engine
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-wide error kinds
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Transport, timeout or endpoint failure. Transient.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Calldata or RPC payload could not be parsed
    #[error("Protocol decode error: {reason}")]
    ProtocolDecode { reason: String },

    /// The simulation service reported a revert or refused the bundle
    #[error("Simulation failed: {reason}")]
    SimulationFailure {
        reason: String,
        gas_used: Option<u64>,
    },

    /// Re-derived profit did not clear the threshold. A normal negative result.
    #[error("Insufficient profit: {net_profit} does not exceed threshold {threshold}")]
    InsufficientProfit { net_profit: U256, threshold: U256 },

    /// Nonce already used, replacement underpriced or fee below base fee
    #[error("Nonce or gas conflict: {reason}")]
    NonceOrGasConflict { reason: String },

    /// Circuit breaker rejected the call without invoking it
    #[error("Circuit breaker open for '{operation}'")]
    CircuitOpen { operation: String },

    /// Rate limiter window exhausted. Transient.
    #[error("Rate limited: '{operation}' exceeded {limit} calls in the current window")]
    RateLimited { operation: String, limit: u32 },

    /// Bundle could not be assembled; nothing partial is returned
    #[error("Bundle construction failed: {reason}")]
    Construction { reason: String },

    /// Connection layer is in critical health; submissions are refused
    #[error("Connectivity unhealthy: {reason}")]
    Unhealthy { reason: String },

    /// Invalid or missing configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Transaction or payload signing failed
    #[error("Signing error: {message}")]
    Signing { message: String },
}

/// Node error fragments that indicate a nonce or fee race rather than a
/// broken endpoint
const NONCE_OR_GAS_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "already known",
    "replacement transaction underpriced",
    "transaction underpriced",
    "max fee per gas less than block base fee",
    "fee cap less than block base fee",
];

impl EngineError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::ProtocolDecode {
            reason: reason.into(),
        }
    }

    pub fn construction(reason: impl Into<String>) -> Self {
        Self::Construction {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Classify an error message returned by a node or relay on submission
    pub fn from_submission_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if NONCE_OR_GAS_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            Self::NonceOrGasConflict { reason: message }
        } else {
            Self::Network { message }
        }
    }

    /// Whether retrying the same operation later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::RateLimited { .. })
    }

    /// Whether the error counts as a failure for circuit breaking and
    /// reporting. Insufficient profit is an expected outcome.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::InsufficientProfit { .. })
    }

    /// Short stable label for events and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::ProtocolDecode { .. } => "protocol_decode",
            Self::SimulationFailure { .. } => "simulation_failure",
            Self::InsufficientProfit { .. } => "insufficient_profit",
            Self::NonceOrGasConflict { .. } => "nonce_or_gas_conflict",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::RateLimited { .. } => "rate_limited",
            Self::Construction { .. } => "construction",
            Self::Unhealthy { .. } => "unhealthy",
            Self::Config { .. } => "config",
            Self::Signing { .. } => "signing",
        }
    }
}
