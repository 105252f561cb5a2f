//! ABI definitions for DEX routers, quoters, pools and the bundle executor
//!
//! Functions are built once into `Lazy` statics and shared by the decoder,
//! the encoders and the quote adapters, so a selector is computed from a
//! single canonical signature.
//!
//! # Supported Protocols
//! - Uniswap V2 router and forks (Sushiswap), including SwapRouter02's V2 entry points
//! - Uniswap V3 SwapRouter and SwapRouter02 (and the PancakeSwap V3 smart router)
//! - Uniswap Universal Router command streams

pub mod erc20;
pub mod executor;
pub mod uniswap_v2;
pub mod uniswap_v3;
pub mod universal_router;

use ethers::abi::{Function, Param, ParamType, StateMutability, Token};
use ethers::types::{Address, Bytes, U256};
use types::{EngineError, EngineResult};

/// Error types for ABI decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Transaction has no destination")]
    ContractCreation,

    #[error("Unknown router {0:?}")]
    UnknownRouter(Address),

    #[error("Unsupported selector 0x{}", hex_selector(.0))]
    UnsupportedSelector([u8; 4]),

    #[error("Calldata too short: {0} bytes")]
    ShortCalldata(usize),

    #[error("ABI parsing failed: {0}")]
    Abi(String),

    #[error("Invalid packed path: {0}")]
    InvalidPath(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("No swap found in call")]
    NoSwap,
}

fn hex_selector(selector: &[u8; 4]) -> String {
    selector.iter().map(|b| format!("{:02x}", b)).collect()
}

impl From<ethers::abi::Error> for DecodeError {
    fn from(err: ethers::abi::Error) -> Self {
        DecodeError::Abi(err.to_string())
    }
}

impl From<DecodeError> for EngineError {
    fn from(err: DecodeError) -> Self {
        EngineError::decode(err.to_string())
    }
}

/// Swap arguments common to every router dialect, before normalisation.
///
/// For exact-output calls `amount_in` is the maximum input and
/// `amount_out_min` the exact output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapArgs {
    pub path: Vec<Address>,
    pub fees: Vec<u32>,
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub recipient: Address,
    pub exact_output: bool,
}

/// Build a function definition from `(name, type)` input pairs
#[allow(deprecated)]
pub(crate) fn function(
    name: &str,
    inputs: &[(&str, ParamType)],
    outputs: &[(&str, ParamType)],
    state_mutability: StateMutability,
) -> Function {
    let params = |list: &[(&str, ParamType)]| {
        list.iter()
            .map(|(name, kind)| Param {
                name: name.to_string(),
                kind: kind.clone(),
                internal_type: None,
            })
            .collect()
    };
    Function {
        name: name.to_string(),
        inputs: params(inputs),
        outputs: params(outputs),
        constant: None,
        state_mutability,
    }
}

/// Encode `function` with its selector; shape mismatches are construction errors
pub fn encode(function: &Function, tokens: &[Token]) -> EngineResult<Bytes> {
    function
        .encode_input(tokens)
        .map(Bytes::from)
        .map_err(|e| EngineError::construction(format!("encoding {}: {}", function.name, e)))
}

/// First four bytes of calldata
pub fn selector(calldata: &[u8]) -> Result<[u8; 4], DecodeError> {
    calldata
        .get(..4)
        .and_then(|s| <[u8; 4]>::try_from(s).ok())
        .ok_or(DecodeError::ShortCalldata(calldata.len()))
}

/// Decode the arguments of `function` from full calldata (selector included)
pub fn decode_call(function: &Function, calldata: &[u8]) -> Result<Vec<Token>, DecodeError> {
    if calldata.len() < 4 {
        return Err(DecodeError::ShortCalldata(calldata.len()));
    }
    Ok(function.decode_input(&calldata[4..])?)
}

/// Decode a return payload
pub fn decode_output(function: &Function, data: &[u8]) -> Result<Vec<Token>, DecodeError> {
    Ok(function.decode_output(data)?)
}

/// Typed token accessors that turn shape mismatches into `DecodeError`
pub(crate) struct Tokens<'a> {
    tokens: &'a [Token],
}

impl<'a> Tokens<'a> {
    pub(crate) fn new(tokens: &'a [Token]) -> Self {
        Self { tokens }
    }

    fn get(&self, index: usize, field: &'static str) -> Result<&'a Token, DecodeError> {
        self.tokens.get(index).ok_or(DecodeError::MissingField(field))
    }

    pub(crate) fn uint(&self, index: usize, field: &'static str) -> Result<U256, DecodeError> {
        self.get(index, field)?
            .clone()
            .into_uint()
            .ok_or(DecodeError::MissingField(field))
    }

    pub(crate) fn address(&self, index: usize, field: &'static str) -> Result<Address, DecodeError> {
        self.get(index, field)?
            .clone()
            .into_address()
            .ok_or(DecodeError::MissingField(field))
    }

    pub(crate) fn bytes(&self, index: usize, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        self.get(index, field)?
            .clone()
            .into_bytes()
            .ok_or(DecodeError::MissingField(field))
    }

    pub(crate) fn address_array(
        &self,
        index: usize,
        field: &'static str,
    ) -> Result<Vec<Address>, DecodeError> {
        self.get(index, field)?
            .clone()
            .into_array()
            .ok_or(DecodeError::MissingField(field))?
            .into_iter()
            .map(|t| t.into_address().ok_or(DecodeError::MissingField(field)))
            .collect()
    }

    pub(crate) fn bytes_array(
        &self,
        index: usize,
        field: &'static str,
    ) -> Result<Vec<Vec<u8>>, DecodeError> {
        self.get(index, field)?
            .clone()
            .into_array()
            .ok_or(DecodeError::MissingField(field))?
            .into_iter()
            .map(|t| t.into_bytes().ok_or(DecodeError::MissingField(field)))
            .collect()
    }

    pub(crate) fn tuple(&self, index: usize, field: &'static str) -> Result<Vec<Token>, DecodeError> {
        self.get(index, field)?
            .clone()
            .into_tuple()
            .ok_or(DecodeError::MissingField(field))
    }
}

/// Narrow a `uint24` fee token
pub(crate) fn fee_from_uint(value: U256) -> Result<u32, DecodeError> {
    if value > U256::from(0x00ff_ffffu32) {
        return Err(DecodeError::Abi(format!("fee {} exceeds uint24", value)));
    }
    Ok(value.as_u32())
}
