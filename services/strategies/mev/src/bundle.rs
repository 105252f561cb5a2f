//! Relay bundle construction

use ethers::types::{Bytes, H256};
use serde_json::{json, Value};

/// Signed transactions submitted together for one target block.
///
/// Order matters: a back-run places the victim transaction before ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayBundle {
    pub transactions: Vec<Bytes>,
    pub target_block: u64,
    pub min_timestamp: Option<u64>,
    pub max_timestamp: Option<u64>,
    /// Hashes allowed to revert without invalidating the bundle
    pub reverting_tx_hashes: Vec<H256>,
}

/// Builder for constructing relay bundles
pub struct BundleBuilder {
    bundle: RelayBundle,
}

impl BundleBuilder {
    pub fn new(target_block: u64) -> Self {
        Self {
            bundle: RelayBundle {
                transactions: Vec::new(),
                target_block,
                min_timestamp: None,
                max_timestamp: None,
                reverting_tx_hashes: Vec::new(),
            },
        }
    }

    pub fn add_transaction(mut self, raw: Bytes) -> Self {
        self.bundle.transactions.push(raw);
        self
    }

    pub fn set_timestamp_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.bundle.min_timestamp = min;
        self.bundle.max_timestamp = max;
        self
    }

    pub fn allow_reverting(mut self, tx_hash: H256) -> Self {
        self.bundle.reverting_tx_hashes.push(tx_hash);
        self
    }

    pub fn build(self) -> RelayBundle {
        self.bundle
    }
}

impl RelayBundle {
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// `eth_sendBundle` parameter object
    pub fn to_params(&self) -> Value {
        let mut params = json!({
            "txs": self.transactions,
            "blockNumber": format!("0x{:x}", self.target_block),
        });
        if let Some(min) = self.min_timestamp {
            params["minTimestamp"] = json!(min);
        }
        if let Some(max) = self.max_timestamp {
            params["maxTimestamp"] = json!(max);
        }
        if !self.reverting_tx_hashes.is_empty() {
            params["revertingTxHashes"] = json!(self.reverting_tx_hashes);
        }
        params
    }
}
