//! Uniswap V2 and compatible protocol ABIs
//!
//! Router swap entry points (UniswapV2Router02 and SwapRouter02's V2 methods),
//! plus the read-only calls quote adapters use: `getAmountsOut`, factory
//! `getPair` and pair `getReserves`.

use super::{decode_call, decode_output, encode, function, DecodeError, SwapArgs, Tokens};
use ethers::abi::{Function, ParamType, StateMutability, Token};
use ethers::types::{Address, Bytes, U256};
use once_cell::sync::Lazy;
use types::EngineResult;

fn address_array() -> ParamType {
    ParamType::Array(Box::new(ParamType::Address))
}

fn exact_in_params(deadline: bool) -> Vec<(&'static str, ParamType)> {
    let mut params = vec![
        ("amountIn", ParamType::Uint(256)),
        ("amountOutMin", ParamType::Uint(256)),
        ("path", address_array()),
        ("to", ParamType::Address),
    ];
    if deadline {
        params.push(("deadline", ParamType::Uint(256)));
    }
    params
}

fn exact_out_params(deadline: bool) -> Vec<(&'static str, ParamType)> {
    let mut params = vec![
        ("amountOut", ParamType::Uint(256)),
        ("amountInMax", ParamType::Uint(256)),
        ("path", address_array()),
        ("to", ParamType::Address),
    ];
    if deadline {
        params.push(("deadline", ParamType::Uint(256)));
    }
    params
}

fn eth_in_params(amount: &'static str) -> Vec<(&'static str, ParamType)> {
    vec![
        (amount, ParamType::Uint(256)),
        ("path", address_array()),
        ("to", ParamType::Address),
        ("deadline", ParamType::Uint(256)),
    ]
}

fn amounts() -> Vec<(&'static str, ParamType)> {
    vec![("amounts", ParamType::Array(Box::new(ParamType::Uint(256))))]
}

fn swap(name: &str, inputs: Vec<(&'static str, ParamType)>, payable: bool) -> Function {
    let mutability = if payable {
        StateMutability::Payable
    } else {
        StateMutability::NonPayable
    };
    function(name, &inputs, &amounts(), mutability)
}

/// Router swap methods recognised by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum V2SwapMethod {
    SwapExactTokensForTokens,
    SwapTokensForExactTokens,
    SwapExactEthForTokens,
    SwapEthForExactTokens,
    SwapExactTokensForEth,
    SwapTokensForExactEth,
    SwapExactTokensForTokensFeeOnTransfer,
    SwapExactEthForTokensFeeOnTransfer,
    SwapExactTokensForEthFeeOnTransfer,
    /// SwapRouter02 `swapExactTokensForTokens(uint256,uint256,address[],address)`
    Router02ExactIn,
    /// SwapRouter02 `swapTokensForExactTokens(uint256,uint256,address[],address)`
    Router02ExactOut,
}

/// Argument layout shared by groups of router methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// (amountIn, amountOutMin, path, to, ..)
    ExactIn,
    /// (amountOut, amountInMax, path, to, ..)
    ExactOut,
    /// (amountOutMin, path, to, deadline), input is `msg.value`
    EthExactIn,
    /// (amountOut, path, to, deadline), maximum input is `msg.value`
    EthExactOut,
}

static SWAP_FUNCTIONS: Lazy<Vec<(V2SwapMethod, Function)>> = Lazy::new(|| {
    use V2SwapMethod::*;
    vec![
        (SwapExactTokensForTokens, swap("swapExactTokensForTokens", exact_in_params(true), false)),
        (SwapTokensForExactTokens, swap("swapTokensForExactTokens", exact_out_params(true), false)),
        (SwapExactEthForTokens, swap("swapExactETHForTokens", eth_in_params("amountOutMin"), true)),
        (SwapEthForExactTokens, swap("swapETHForExactTokens", eth_in_params("amountOut"), true)),
        (SwapExactTokensForEth, swap("swapExactTokensForETH", exact_in_params(true), false)),
        (SwapTokensForExactEth, swap("swapTokensForExactETH", exact_out_params(true), false)),
        (
            SwapExactTokensForTokensFeeOnTransfer,
            swap(
                "swapExactTokensForTokensSupportingFeeOnTransferTokens",
                exact_in_params(true),
                false,
            ),
        ),
        (
            SwapExactEthForTokensFeeOnTransfer,
            swap(
                "swapExactETHForTokensSupportingFeeOnTransferTokens",
                eth_in_params("amountOutMin"),
                true,
            ),
        ),
        (
            SwapExactTokensForEthFeeOnTransfer,
            swap(
                "swapExactTokensForETHSupportingFeeOnTransferTokens",
                exact_in_params(true),
                false,
            ),
        ),
        (Router02ExactIn, swap("swapExactTokensForTokens", exact_in_params(false), true)),
        (Router02ExactOut, swap("swapTokensForExactTokens", exact_out_params(false), true)),
    ]
});

impl V2SwapMethod {
    pub fn from_selector(selector: [u8; 4]) -> Option<Self> {
        SWAP_FUNCTIONS
            .iter()
            .find(|(_, f)| f.short_signature() == selector)
            .map(|(method, _)| *method)
    }

    pub fn function(&self) -> &'static Function {
        // Table order follows declaration order
        &SWAP_FUNCTIONS[*self as usize].1
    }

    fn layout(&self) -> Layout {
        use V2SwapMethod::*;
        match self {
            SwapExactTokensForTokens
            | SwapExactTokensForEth
            | SwapExactTokensForTokensFeeOnTransfer
            | SwapExactTokensForEthFeeOnTransfer
            | Router02ExactIn => Layout::ExactIn,
            SwapTokensForExactTokens | SwapTokensForExactEth | Router02ExactOut => Layout::ExactOut,
            SwapExactEthForTokens | SwapExactEthForTokensFeeOnTransfer => Layout::EthExactIn,
            SwapEthForExactTokens => Layout::EthExactOut,
        }
    }

    /// Decode swap arguments; `value` is the transaction's native value
    pub fn decode(&self, calldata: &[u8], value: U256) -> Result<SwapArgs, DecodeError> {
        let tokens = decode_call(self.function(), calldata)?;
        let args = Tokens::new(&tokens);
        let (amount_in, amount_out_min, path, recipient, exact_output) = match self.layout() {
            Layout::ExactIn => (
                args.uint(0, "amountIn")?,
                args.uint(1, "amountOutMin")?,
                args.address_array(2, "path")?,
                args.address(3, "to")?,
                false,
            ),
            Layout::ExactOut => (
                args.uint(1, "amountInMax")?,
                args.uint(0, "amountOut")?,
                args.address_array(2, "path")?,
                args.address(3, "to")?,
                true,
            ),
            Layout::EthExactIn => (
                value,
                args.uint(0, "amountOutMin")?,
                args.address_array(1, "path")?,
                args.address(2, "to")?,
                false,
            ),
            Layout::EthExactOut => (
                value,
                args.uint(0, "amountOut")?,
                args.address_array(1, "path")?,
                args.address(2, "to")?,
                true,
            ),
        };
        if path.len() < 2 {
            return Err(DecodeError::InvalidPath(format!(
                "path has {} tokens",
                path.len()
            )));
        }
        Ok(SwapArgs {
            path,
            fees: Vec::new(),
            amount_in,
            amount_out_min,
            recipient,
            exact_output,
        })
    }
}

/// swapExactTokensForTokens calldata for UniswapV2Router02
pub fn encode_swap_exact_tokens_for_tokens(
    amount_in: U256,
    amount_out_min: U256,
    path: &[Address],
    to: Address,
    deadline: U256,
) -> EngineResult<Bytes> {
    encode(
        V2SwapMethod::SwapExactTokensForTokens.function(),
        &[
            Token::Uint(amount_in),
            Token::Uint(amount_out_min),
            Token::Array(path.iter().copied().map(Token::Address).collect()),
            Token::Address(to),
            Token::Uint(deadline),
        ],
    )
}

/// getAmountsOut(uint256 amountIn, address[] path) returns (uint256[] amounts)
pub static GET_AMOUNTS_OUT: Lazy<Function> = Lazy::new(|| {
    function(
        "getAmountsOut",
        &[("amountIn", ParamType::Uint(256)), ("path", address_array())],
        &amounts(),
        StateMutability::View,
    )
});

/// Factory getPair(address tokenA, address tokenB) returns (address pair)
pub static GET_PAIR: Lazy<Function> = Lazy::new(|| {
    function(
        "getPair",
        &[("tokenA", ParamType::Address), ("tokenB", ParamType::Address)],
        &[("pair", ParamType::Address)],
        StateMutability::View,
    )
});

/// Pair getReserves() returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
pub static GET_RESERVES: Lazy<Function> = Lazy::new(|| {
    function(
        "getReserves",
        &[],
        &[
            ("reserve0", ParamType::Uint(112)),
            ("reserve1", ParamType::Uint(112)),
            ("blockTimestampLast", ParamType::Uint(32)),
        ],
        StateMutability::View,
    )
});

pub fn encode_get_amounts_out(amount_in: U256, path: &[Address]) -> EngineResult<Bytes> {
    encode(
        &GET_AMOUNTS_OUT,
        &[
            Token::Uint(amount_in),
            Token::Array(path.iter().copied().map(Token::Address).collect()),
        ],
    )
}

/// Final element of the `getAmountsOut` result
pub fn decode_amounts_out(data: &[u8]) -> Result<U256, DecodeError> {
    let tokens = decode_output(&GET_AMOUNTS_OUT, data)?;
    let amounts = tokens
        .into_iter()
        .next()
        .and_then(|t| t.into_array())
        .ok_or(DecodeError::MissingField("amounts"))?;
    amounts
        .into_iter()
        .last()
        .and_then(|t| t.into_uint())
        .ok_or(DecodeError::MissingField("amounts"))
}

pub fn encode_get_pair(token_a: Address, token_b: Address) -> EngineResult<Bytes> {
    encode(&GET_PAIR, &[Token::Address(token_a), Token::Address(token_b)])
}

pub fn decode_pair(data: &[u8]) -> Result<Address, DecodeError> {
    let tokens = decode_output(&GET_PAIR, data)?;
    Tokens::new(&tokens).address(0, "pair")
}

pub fn encode_get_reserves() -> EngineResult<Bytes> {
    encode(&GET_RESERVES, &[])
}

/// `(reserve0, reserve1)`
pub fn decode_reserves(data: &[u8]) -> Result<(U256, U256), DecodeError> {
    let tokens = decode_output(&GET_RESERVES, data)?;
    let reserves = Tokens::new(&tokens);
    Ok((reserves.uint(0, "reserve0")?, reserves.uint(1, "reserve1")?))
}
