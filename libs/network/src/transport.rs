//! JSON-RPC transports
//!
//! [`RpcTransport`] is the seam between the connection manager and the wire.
//! Production uses [`HttpTransport`] (ethers' HTTP client over a pooled
//! `reqwest::Client`); tests substitute scripted transports.

use async_trait::async_trait;
use ethers::providers::{Http, HttpClientError, JsonRpcClient};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::{NetworkError, Result};

/// One JSON-RPC endpoint
#[async_trait]
pub trait RpcTransport: Send + Sync + std::fmt::Debug {
    fn endpoint(&self) -> &str;

    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// HTTP JSON-RPC transport
#[derive(Debug)]
pub struct HttpTransport {
    endpoint: String,
    inner: Http,
}

impl HttpTransport {
    pub fn new(endpoint: &str, client: reqwest::Client) -> Result<Self> {
        let url: Url = endpoint
            .parse()
            .map_err(|e| NetworkError::configuration(format!("invalid RPC url '{}': {}", endpoint, e)))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            inner: Http::new_with_client(url, client),
        })
    }

    /// Shared HTTP client with connection pooling for every endpoint
    pub fn pooled_client(request_timeout: Duration) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(request_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| NetworkError::configuration(format!("failed to build HTTP client: {}", e)))
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.inner
            .request::<Value, Value>(method, params)
            .await
            .map_err(|e| match e {
                HttpClientError::JsonRpcError(rpc) => NetworkError::Rpc {
                    code: rpc.code,
                    message: rpc.message,
                },
                HttpClientError::SerdeJson { err, .. } => {
                    NetworkError::protocol(format!("{} response: {}", method, err))
                }
                other => NetworkError::transport(&self.endpoint, other),
            })
    }
}
