//! Typed chain access on top of the connection manager
//!
//! Components depend on [`ChainClient`] rather than the manager so tests can
//! substitute in-memory chains.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Transaction, TransactionReceipt, H256, U256, U64};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::connection::{ConnectionManager, HealthStatus};
use crate::{NetworkError, Result};

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    async fn gas_price(&self) -> Result<U256>;

    /// Pending nonce for `address`
    async fn transaction_count(&self, address: Address) -> Result<U256>;

    /// `eth_call` against the latest block
    async fn call_contract(&self, to: Address, data: Bytes) -> Result<Bytes>;

    async fn estimate_gas(&self, from: Address, to: Address, data: Bytes, value: U256)
        -> Result<U256>;

    async fn transaction_by_hash(&self, hash: H256) -> Result<Option<Transaction>>;

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256>;

    fn health(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| NetworkError::protocol(format!("unexpected {} response: {}", method, e)))
}

#[async_trait]
impl ChainClient for ConnectionManager {
    async fn block_number(&self) -> Result<u64> {
        let value = self.call("eth_blockNumber", json!([])).await?;
        decode::<U64>("eth_blockNumber", value).map(|n| n.as_u64())
    }

    async fn gas_price(&self) -> Result<U256> {
        let value = self.call("eth_gasPrice", json!([])).await?;
        decode("eth_gasPrice", value)
    }

    async fn transaction_count(&self, address: Address) -> Result<U256> {
        let value = self
            .call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        decode("eth_getTransactionCount", value)
    }

    async fn call_contract(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let value = self
            .call("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        decode("eth_call", value)
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<U256> {
        let result = self
            .call(
                "eth_estimateGas",
                json!([{ "from": from, "to": to, "data": data, "value": value }]),
            )
            .await?;
        decode("eth_estimateGas", result)
    }

    async fn transaction_by_hash(&self, hash: H256) -> Result<Option<Transaction>> {
        let value = self
            .call("eth_getTransactionByHash", json!([hash]))
            .await?;
        decode("eth_getTransactionByHash", value)
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        let value = self
            .call("eth_getTransactionReceipt", json!([hash]))
            .await?;
        decode("eth_getTransactionReceipt", value)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let value = self.call("eth_sendRawTransaction", json!([raw])).await?;
        decode("eth_sendRawTransaction", value)
    }

    fn health(&self) -> HealthStatus {
        ConnectionManager::health(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;
    use crate::transport::RpcTransport;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records the last request and replies with a fixed value
    #[derive(Debug)]
    struct Recording {
        reply: Value,
        last: Mutex<Option<(String, Value)>>,
    }

    #[async_trait]
    impl RpcTransport for Recording {
        fn endpoint(&self) -> &str {
            "recording"
        }

        async fn request(&self, method: &str, params: Value) -> Result<Value> {
            *self.last.lock() = Some((method.to_string(), params));
            Ok(self.reply.clone())
        }
    }

    fn client(reply: Value) -> (Arc<Recording>, ConnectionManager) {
        let transport = Arc::new(Recording {
            reply,
            last: Mutex::new(None),
        });
        let manager = ConnectionManager::with_transports(
            ConnectionConfig::default(),
            vec![transport.clone() as Arc<dyn RpcTransport>],
        )
        .unwrap();
        (transport, manager)
    }

    #[tokio::test]
    async fn test_block_number_hex_decoding() {
        let (_, manager) = client(json!("0x10d4f"));
        assert_eq!(manager.block_number().await.unwrap(), 68943);
    }

    #[tokio::test]
    async fn test_eth_call_request_shape() {
        let (transport, manager) = client(json!("0x0000000000000000000000000000000000000000000000000000000000000001"));
        let to = Address::repeat_byte(0x42);
        let out = manager
            .call_contract(to, Bytes::from(vec![0xde, 0xad]))
            .await
            .unwrap();
        assert_eq!(out.len(), 32);

        let (method, params) = transport.last.lock().clone().unwrap();
        assert_eq!(method, "eth_call");
        assert_eq!(params[0]["data"], json!("0xdead"));
        assert_eq!(params[1], json!("latest"));
    }

    #[tokio::test]
    async fn test_missing_transaction_is_none() {
        let (_, manager) = client(Value::Null);
        let tx = manager.transaction_by_hash(H256::zero()).await.unwrap();
        assert!(tx.is_none());
    }

    #[tokio::test]
    async fn test_malformed_response_is_protocol_error() {
        let (_, manager) = client(json!({"unexpected": true}));
        let err = manager.gas_price().await.unwrap_err();
        assert!(matches!(err, NetworkError::Protocol { .. }));
    }
}
