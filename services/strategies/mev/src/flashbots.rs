//! Private relay submission (`eth_sendBundle`)
//!
//! Requests are authenticated with the `X-Flashbots-Signature` header: an
//! EIP-191 signature over the hex string of `keccak256(body)`, prefixed with
//! the signer address.

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::H256;
use ethers::utils::keccak256;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use types::{EngineError, EngineResult};

use crate::bundle::RelayBundle;

pub const SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

/// Relay acceptance receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAck {
    pub relay: String,
    pub bundle_hash: Option<H256>,
}

/// A builder or relay endpoint accepting bundles
#[async_trait]
pub trait BundleRelay: Send + Sync {
    fn name(&self) -> &str;

    async fn send_bundle(&self, bundle: &RelayBundle) -> EngineResult<RelayAck>;
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// HTTP client for one relay
pub struct RelayClient {
    name: String,
    url: String,
    http: reqwest::Client,
    auth_signer: LocalWallet,
    timeout: Duration,
}

impl RelayClient {
    /// `auth_signer` identifies the searcher to the relay; it never holds funds
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        http: reqwest::Client,
        auth_signer: LocalWallet,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            http,
            auth_signer,
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request_body(bundle: &RelayBundle) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_sendBundle",
            "params": [bundle.to_params()],
        })
    }

    /// `address:0xsignature` for the given request body
    pub async fn sign_body(&self, body: &[u8]) -> EngineResult<String> {
        let digest = format!("{:?}", H256::from(keccak256(body)));
        let signature = self
            .auth_signer
            .sign_message(digest)
            .await
            .map_err(|e| EngineError::signing(format!("relay auth signature: {}", e)))?;
        Ok(format!("{:?}:0x{}", self.auth_signer.address(), signature))
    }
}

#[async_trait]
impl BundleRelay for RelayClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_bundle(&self, bundle: &RelayBundle) -> EngineResult<RelayAck> {
        let body = serde_json::to_vec(&Self::request_body(bundle))
            .map_err(|e| EngineError::construction(format!("bundle body: {}", e)))?;
        let signature = self.sign_body(&body).await?;

        debug!(
            "📦 Sending {}-tx bundle for block {} to {}",
            bundle.transaction_count(),
            bundle.target_block,
            self.name
        );

        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngineError::network(format!("{}: {}", self.name, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::network(format!("{}: {}", self.name, e)))?;
        if !status.is_success() {
            return Err(EngineError::from_submission_message(format!(
                "{} returned HTTP {}: {}",
                self.name, status, text
            )));
        }

        let reply: RpcResponse = serde_json::from_str(&text)
            .map_err(|e| EngineError::decode(format!("{} reply: {}", self.name, e)))?;
        if let Some(error) = reply.error {
            return Err(EngineError::from_submission_message(format!(
                "{} rejected bundle ({}): {}",
                self.name, error.code, error.message
            )));
        }

        let bundle_hash = reply
            .result
            .as_ref()
            .and_then(|r| r.get("bundleHash"))
            .and_then(|h| serde_json::from_value::<H256>(h.clone()).ok());
        Ok(RelayAck {
            relay: self.name.clone(),
            bundle_hash,
        })
    }
}
