//! Atomic bundle model: flash loan plus an ordered list of contract calls

use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Role a call plays inside a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Approval,
    Swap,
    /// Converts between the flash-loaned token and the route's base token
    Substitution,
    /// Miner/builder payment
    Tip,
}

/// One contract call executed by the on-chain executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub kind: CallKind,
    pub target: Address,
    pub calldata: Bytes,
    pub value: U256,
    /// The call spends `approval_token` held by the executor
    pub requires_approval: bool,
    pub approval_token: Option<Address>,
    pub approval_amount: U256,
}

impl Call {
    pub fn new(kind: CallKind, target: Address, calldata: Bytes) -> Self {
        Self {
            kind,
            target,
            calldata,
            value: U256::zero(),
            requires_approval: false,
            approval_token: None,
            approval_amount: U256::zero(),
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Mark the call as spending `amount` of `token` from the executor
    pub fn spending(mut self, token: Address, amount: U256) -> Self {
        self.requires_approval = true;
        self.approval_token = Some(token);
        self.approval_amount = amount;
        self
    }
}

/// Uncollateralized loan repaid within the same transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashLoanRequest {
    pub provider: Address,
    pub token: Address,
    pub amount: U256,
}

/// All-or-nothing call sequence funded by a flash loan.
///
/// Atomicity is enforced by the executor contract; calls are never split
/// across transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub flashloan: FlashLoanRequest,
    pub calls: Vec<Call>,
    pub base_token: Address,
    /// Expected net profit in base-token units at construction time
    pub expected_profit: U256,
}

impl Bundle {
    pub fn count(&self, kind: CallKind) -> usize {
        self.calls.iter().filter(|call| call.kind == kind).count()
    }

    /// Total native value the executor must forward across calls
    pub fn total_value(&self) -> U256 {
        self.calls
            .iter()
            .fold(U256::zero(), |acc, call| acc.saturating_add(call.value))
    }
}
