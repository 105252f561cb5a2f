//! Swap intents decoded from pending transactions

use crate::dex::DexKind;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Normalised view of a pending DEX swap, valid for one mempool event.
///
/// For exact-output calls `amount_in` is the maximum input and
/// `amount_out_min` the exact output requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSwap {
    pub tx_hash: H256,
    pub dex: DexKind,
    pub router: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub recipient: Address,
    /// Full token path, `path[0] == token_in` and `path[last] == token_out`
    pub path: Vec<Address>,
    /// Fee tier per pool for V3 paths, empty for path-array swaps
    pub fees: Vec<u32>,
    pub exact_output: bool,
}

impl DecodedSwap {
    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Tokens touched by the swap other than the given one
    pub fn counter_tokens(&self, exclude: Address) -> Vec<Address> {
        let mut tokens: Vec<Address> = Vec::with_capacity(self.path.len());
        for token in &self.path {
            if *token != exclude && !tokens.contains(token) {
                tokens.push(*token);
            }
        }
        tokens
    }
}
