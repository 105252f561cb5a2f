//! EIP-1559 transaction signing

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, H256, U256};
use ethers::utils::keccak256;
use types::{EngineError, EngineResult};

/// Fields of an executor transaction before signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub nonce: U256,
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Type-2 envelope ready for `eth_sendRawTransaction` or a bundle
    pub raw: Bytes,
    pub hash: H256,
}

pub struct TransactionSigner {
    wallet: LocalWallet,
    chain_id: u64,
}

impl TransactionSigner {
    pub fn new(wallet: LocalWallet, chain_id: u64) -> Self {
        Self {
            wallet: wallet.with_chain_id(chain_id),
            chain_id,
        }
    }

    /// Hex private key, with or without `0x`
    pub fn from_private_key(key: &str, chain_id: u64) -> EngineResult<Self> {
        let wallet: LocalWallet = key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| EngineError::signing(format!("invalid private key: {}", e)))?;
        Ok(Self::new(wallet, chain_id))
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }

    pub fn sign(&self, tx: &UnsignedTransaction) -> EngineResult<SignedTransaction> {
        let request = Eip1559TransactionRequest::new()
            .from(self.address())
            .to(tx.to)
            .data(tx.data.clone())
            .value(tx.value)
            .nonce(tx.nonce)
            .gas(tx.gas_limit)
            .max_fee_per_gas(tx.max_fee_per_gas)
            .max_priority_fee_per_gas(tx.max_priority_fee_per_gas)
            .chain_id(self.chain_id);
        let typed: TypedTransaction = request.into();

        let signature = self
            .wallet
            .sign_transaction_sync(&typed)
            .map_err(|e| EngineError::signing(e.to_string()))?;
        let raw = typed.rlp_signed(&signature);
        let hash = H256::from(keccak256(&raw));
        Ok(SignedTransaction { raw, hash })
    }
}
