//! Uniswap V3 packed paths: `token (20) | fee (3) | token (20) | ...`
//!
//! Exact-output calls pass the path reversed (output token first); callers
//! flip the decoded vectors themselves.

use crate::abi::DecodeError;
use ethers::types::Address;
use types::{EngineError, EngineResult};

pub const ADDRESS_SIZE: usize = 20;
pub const FEE_SIZE: usize = 3;
const HOP_SIZE: usize = ADDRESS_SIZE + FEE_SIZE;
const MAX_FEE: u32 = 0x00ff_ffff;

/// Tokens and fee tiers of a packed path; `tokens.len() == fees.len() + 1`
pub fn decode_path(path: &[u8]) -> Result<(Vec<Address>, Vec<u32>), DecodeError> {
    if path.len() < ADDRESS_SIZE + HOP_SIZE || (path.len() - ADDRESS_SIZE) % HOP_SIZE != 0 {
        return Err(DecodeError::InvalidPath(format!(
            "length {} is not 20 + 23k",
            path.len()
        )));
    }

    let hops = (path.len() - ADDRESS_SIZE) / HOP_SIZE;
    let mut tokens = Vec::with_capacity(hops + 1);
    let mut fees = Vec::with_capacity(hops);

    tokens.push(Address::from_slice(&path[..ADDRESS_SIZE]));
    for hop in 0..hops {
        let start = ADDRESS_SIZE + hop * HOP_SIZE;
        let fee = &path[start..start + FEE_SIZE];
        fees.push((u32::from(fee[0]) << 16) | (u32::from(fee[1]) << 8) | u32::from(fee[2]));
        tokens.push(Address::from_slice(
            &path[start + FEE_SIZE..start + HOP_SIZE],
        ));
    }
    Ok((tokens, fees))
}

pub fn encode_path(tokens: &[Address], fees: &[u32]) -> EngineResult<Vec<u8>> {
    if tokens.len() < 2 || tokens.len() != fees.len() + 1 {
        return Err(EngineError::construction(format!(
            "path needs n+1 tokens for n fees, got {} tokens and {} fees",
            tokens.len(),
            fees.len()
        )));
    }

    let mut path = Vec::with_capacity(ADDRESS_SIZE + fees.len() * HOP_SIZE);
    path.extend_from_slice(tokens[0].as_bytes());
    for (token, fee) in tokens[1..].iter().zip(fees) {
        if *fee > MAX_FEE {
            return Err(EngineError::construction(format!(
                "fee {} exceeds uint24",
                fee
            )));
        }
        path.extend_from_slice(&fee.to_be_bytes()[1..]);
        path.extend_from_slice(token.as_bytes());
    }
    Ok(path)
}
