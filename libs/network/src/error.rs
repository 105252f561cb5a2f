//! Transport Error Types
//!
//! Error handling for JSON-RPC transport, WebSocket subscriptions and
//! endpoint supervision.

use thiserror::Error;
use types::EngineError;

/// Result alias for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Main network error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Connection refused, reset, TLS failure or HTTP-level error
    #[error("Transport error on {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// Call exceeded its deadline
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The node answered with a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response did not have the expected shape
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl NetworkError {
    pub fn transport(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// The endpoint itself misbehaved; eligible for failover
    pub fn is_endpoint_failure(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// Retrying later can succeed
    pub fn is_transient(&self) -> bool {
        self.is_endpoint_failure()
    }
}

impl From<NetworkError> for EngineError {
    fn from(error: NetworkError) -> Self {
        match error {
            NetworkError::Rpc { message, .. } => EngineError::from_submission_message(message),
            NetworkError::Protocol { message } => EngineError::ProtocolDecode { reason: message },
            NetworkError::Configuration { message } => EngineError::Config { message },
            other => EngineError::Network {
                message: other.to_string(),
            },
        }
    }
}
