//! In-memory chain for unit tests

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Transaction, TransactionReceipt, H256, U256};
use network::{ChainClient, HealthStatus, NetworkError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

pub struct MockChain {
    gas_price: Mutex<Option<U256>>,
    gas_price_calls: AtomicU32,
    block: AtomicU64,
    nonce: Mutex<U256>,
    calls: Mutex<HashMap<(Address, Vec<u8>), Bytes>>,
    contract_calls: AtomicU32,
    transactions: Mutex<HashMap<H256, Transaction>>,
    transaction_lookups: AtomicU32,
    receipts: Mutex<HashMap<H256, TransactionReceipt>>,
    health: Mutex<HealthStatus>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            gas_price: Mutex::new(Some(U256::from(1_000_000_000u64))),
            gas_price_calls: AtomicU32::new(0),
            block: AtomicU64::new(100),
            nonce: Mutex::new(U256::zero()),
            calls: Mutex::new(HashMap::new()),
            contract_calls: AtomicU32::new(0),
            transactions: Mutex::new(HashMap::new()),
            transaction_lookups: AtomicU32::new(0),
            receipts: Mutex::new(HashMap::new()),
            health: Mutex::new(HealthStatus::Healthy),
        }
    }

    pub fn set_gas_price(&self, price: U256) {
        *self.gas_price.lock() = Some(price);
    }

    pub fn fail_gas_price(&self) {
        *self.gas_price.lock() = None;
    }

    pub fn gas_price_calls(&self) -> u32 {
        self.gas_price_calls.load(Ordering::SeqCst)
    }

    pub fn set_block(&self, block: u64) {
        self.block.store(block, Ordering::SeqCst);
    }

    /// Answer `eth_call(to, data)` with `output`; unknown calls revert
    pub fn respond(&self, to: Address, data: Bytes, output: Vec<u8>) {
        self.calls.lock().insert((to, data.to_vec()), Bytes::from(output));
    }

    pub fn contract_calls(&self) -> u32 {
        self.contract_calls.load(Ordering::SeqCst)
    }

    pub fn add_transaction(&self, tx: Transaction) {
        self.transactions.lock().insert(tx.hash, tx);
    }

    pub fn transaction_lookups(&self) -> u32 {
        self.transaction_lookups.load(Ordering::SeqCst)
    }

    pub fn add_receipt(&self, receipt: TransactionReceipt) {
        self.receipts.lock().insert(receipt.transaction_hash, receipt);
    }

    pub fn set_health(&self, health: HealthStatus) {
        *self.health.lock() = health;
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> network::Result<u64> {
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn gas_price(&self) -> network::Result<U256> {
        self.gas_price_calls.fetch_add(1, Ordering::SeqCst);
        let price = *self.gas_price.lock();
        price.ok_or_else(|| NetworkError::transport("mock", "connection refused"))
    }

    async fn transaction_count(&self, _address: Address) -> network::Result<U256> {
        Ok(*self.nonce.lock())
    }

    async fn call_contract(&self, to: Address, data: Bytes) -> network::Result<Bytes> {
        self.contract_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.calls.lock().get(&(to, data.to_vec())).cloned();
        reply.ok_or_else(|| NetworkError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
        })
    }

    async fn estimate_gas(
        &self,
        _from: Address,
        _to: Address,
        _data: Bytes,
        _value: U256,
    ) -> network::Result<U256> {
        Ok(U256::from(300_000))
    }

    async fn transaction_by_hash(&self, hash: H256) -> network::Result<Option<Transaction>> {
        self.transaction_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.transactions.lock().get(&hash).cloned())
    }

    async fn transaction_receipt(&self, hash: H256) -> network::Result<Option<TransactionReceipt>> {
        Ok(self.receipts.lock().get(&hash).cloned())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> network::Result<H256> {
        Ok(H256::from(ethers::utils::keccak256(&raw)))
    }

    fn health(&self) -> HealthStatus {
        *self.health.lock()
    }
}
