//! ERC-20 approvals used by bundles

use super::{encode, function};
use ethers::abi::{Function, ParamType, StateMutability, Token};
use ethers::types::{Address, Bytes, U256};
use once_cell::sync::Lazy;
use types::EngineResult;

/// approve(address spender, uint256 amount)
pub static APPROVE: Lazy<Function> = Lazy::new(|| {
    function(
        "approve",
        &[("spender", ParamType::Address), ("amount", ParamType::Uint(256))],
        &[("", ParamType::Bool)],
        StateMutability::NonPayable,
    )
});

pub fn encode_approve(spender: Address, amount: U256) -> EngineResult<Bytes> {
    encode(&APPROVE, &[Token::Address(spender), Token::Uint(amount)])
}
