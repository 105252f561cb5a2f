//! Uniswap V3 and compatible protocol ABIs
//!
//! SwapRouter (structs carry a `deadline`) and SwapRouter02 (deadline moved to
//! `multicall`) swap entry points, their `multicall` wrappers, the V1 Quoter,
//! and the pool views used for local estimates.

use super::{
    decode_call, decode_output, encode, fee_from_uint, function, selector, DecodeError, SwapArgs,
    Tokens,
};
use crate::path::decode_path;
use ethers::abi::{Function, ParamType, StateMutability, Token};
use ethers::types::{Address, Bytes, U256};
use once_cell::sync::Lazy;
use types::EngineResult;

/// Struct layout generation of a V3 router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum V3Dialect {
    /// Original SwapRouter, `deadline` inside every params struct
    SwapRouter,
    /// SwapRouter02 and compatible smart routers
    SwapRouter02,
}

impl V3Dialect {
    fn has_deadline(&self) -> bool {
        matches!(self, V3Dialect::SwapRouter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum V3SwapMethod {
    ExactInputSingle,
    ExactInput,
    ExactOutputSingle,
    ExactOutput,
}

impl V3SwapMethod {
    pub const ALL: [V3SwapMethod; 4] = [
        V3SwapMethod::ExactInputSingle,
        V3SwapMethod::ExactInput,
        V3SwapMethod::ExactOutputSingle,
        V3SwapMethod::ExactOutput,
    ];

    fn name(&self) -> &'static str {
        match self {
            V3SwapMethod::ExactInputSingle => "exactInputSingle",
            V3SwapMethod::ExactInput => "exactInput",
            V3SwapMethod::ExactOutputSingle => "exactOutputSingle",
            V3SwapMethod::ExactOutput => "exactOutput",
        }
    }

    fn is_single(&self) -> bool {
        matches!(
            self,
            V3SwapMethod::ExactInputSingle | V3SwapMethod::ExactOutputSingle
        )
    }

    fn is_exact_output(&self) -> bool {
        matches!(
            self,
            V3SwapMethod::ExactOutputSingle | V3SwapMethod::ExactOutput
        )
    }

    fn params(&self, dialect: V3Dialect) -> ParamType {
        let mut fields = if self.is_single() {
            vec![
                ParamType::Address,   // tokenIn
                ParamType::Address,   // tokenOut
                ParamType::Uint(24),  // fee
                ParamType::Address,   // recipient
            ]
        } else {
            vec![ParamType::Bytes, ParamType::Address] // path, recipient
        };
        if dialect.has_deadline() {
            fields.push(ParamType::Uint(256));
        }
        // amountIn/amountOutMinimum or amountOut/amountInMaximum
        fields.push(ParamType::Uint(256));
        fields.push(ParamType::Uint(256));
        if self.is_single() {
            fields.push(ParamType::Uint(160)); // sqrtPriceLimitX96
        }
        ParamType::Tuple(fields)
    }

    fn build(&self, dialect: V3Dialect) -> Function {
        function(
            self.name(),
            &[("params", self.params(dialect))],
            &[("amount", ParamType::Uint(256))],
            StateMutability::Payable,
        )
    }

    pub fn function(&self, dialect: V3Dialect) -> &'static Function {
        let table = match dialect {
            V3Dialect::SwapRouter => &*SWAP_ROUTER,
            V3Dialect::SwapRouter02 => &*SWAP_ROUTER_02,
        };
        &table[*self as usize]
    }

    pub fn from_selector(dialect: V3Dialect, selector: [u8; 4]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.function(dialect).short_signature() == selector)
    }

    /// Decode swap arguments; packed paths are returned in swap direction
    pub fn decode(&self, dialect: V3Dialect, calldata: &[u8]) -> Result<SwapArgs, DecodeError> {
        let tokens = decode_call(self.function(dialect), calldata)?;
        let params = Tokens::new(&tokens).tuple(0, "params")?;
        let params = Tokens::new(&params);

        let (mut path, mut fees, recipient_index) = if self.is_single() {
            let token_in = params.address(0, "tokenIn")?;
            let token_out = params.address(1, "tokenOut")?;
            let fee = fee_from_uint(params.uint(2, "fee")?)?;
            (vec![token_in, token_out], vec![fee], 3)
        } else {
            let (path, fees) = decode_path(&params.bytes(0, "path")?)?;
            (path, fees, 1)
        };
        let recipient = params.address(recipient_index, "recipient")?;

        let amounts_at = recipient_index + if dialect.has_deadline() { 2 } else { 1 };
        let specified = params.uint(amounts_at, "amount")?;
        let limit = params.uint(amounts_at + 1, "amountLimit")?;

        let exact_output = self.is_exact_output();
        if exact_output && !self.is_single() {
            // Exact-output paths are encoded output-first
            path.reverse();
            fees.reverse();
        }

        let (amount_in, amount_out_min) = if exact_output {
            (limit, specified)
        } else {
            (specified, limit)
        };
        Ok(SwapArgs {
            path,
            fees,
            amount_in,
            amount_out_min,
            recipient,
            exact_output,
        })
    }
}

static SWAP_ROUTER: Lazy<Vec<Function>> = Lazy::new(|| {
    V3SwapMethod::ALL
        .iter()
        .map(|m| m.build(V3Dialect::SwapRouter))
        .collect()
});

static SWAP_ROUTER_02: Lazy<Vec<Function>> = Lazy::new(|| {
    V3SwapMethod::ALL
        .iter()
        .map(|m| m.build(V3Dialect::SwapRouter02))
        .collect()
});

fn bytes_array() -> ParamType {
    ParamType::Array(Box::new(ParamType::Bytes))
}

/// multicall(bytes[] data)
pub static MULTICALL: Lazy<Function> = Lazy::new(|| {
    function(
        "multicall",
        &[("data", bytes_array())],
        &[("results", bytes_array())],
        StateMutability::Payable,
    )
});

/// SwapRouter02 multicall(uint256 deadline, bytes[] data)
pub static MULTICALL_DEADLINE: Lazy<Function> = Lazy::new(|| {
    function(
        "multicall",
        &[("deadline", ParamType::Uint(256)), ("data", bytes_array())],
        &[("results", bytes_array())],
        StateMutability::Payable,
    )
});

/// SwapRouter02 multicall(bytes32 previousBlockhash, bytes[] data)
pub static MULTICALL_BLOCKHASH: Lazy<Function> = Lazy::new(|| {
    function(
        "multicall",
        &[
            ("previousBlockhash", ParamType::FixedBytes(32)),
            ("data", bytes_array()),
        ],
        &[("results", bytes_array())],
        StateMutability::Payable,
    )
});

/// Inner calls of any multicall variant, `None` when `calldata` is not a multicall
pub fn decode_multicall(calldata: &[u8]) -> Option<Result<Vec<Vec<u8>>, DecodeError>> {
    let selector = selector(calldata).ok()?;
    let (function, data_index) = if selector == MULTICALL.short_signature() {
        (&*MULTICALL, 0)
    } else if selector == MULTICALL_DEADLINE.short_signature() {
        (&*MULTICALL_DEADLINE, 1)
    } else if selector == MULTICALL_BLOCKHASH.short_signature() {
        (&*MULTICALL_BLOCKHASH, 1)
    } else {
        return None;
    };
    Some(
        decode_call(function, calldata)
            .and_then(|tokens| Tokens::new(&tokens).bytes_array(data_index, "data")),
    )
}

/// exactInputSingle calldata for either router generation
#[allow(clippy::too_many_arguments)]
pub fn encode_exact_input_single(
    dialect: V3Dialect,
    token_in: Address,
    token_out: Address,
    fee: u32,
    recipient: Address,
    deadline: U256,
    amount_in: U256,
    amount_out_minimum: U256,
) -> EngineResult<Bytes> {
    let mut fields = vec![
        Token::Address(token_in),
        Token::Address(token_out),
        Token::Uint(U256::from(fee)),
        Token::Address(recipient),
    ];
    if dialect.has_deadline() {
        fields.push(Token::Uint(deadline));
    }
    fields.push(Token::Uint(amount_in));
    fields.push(Token::Uint(amount_out_minimum));
    fields.push(Token::Uint(U256::zero()));
    encode(
        V3SwapMethod::ExactInputSingle.function(dialect),
        &[Token::Tuple(fields)],
    )
}

/// exactInput calldata over a packed `token (fee token)+` path
pub fn encode_exact_input(
    dialect: V3Dialect,
    path: Vec<u8>,
    recipient: Address,
    deadline: U256,
    amount_in: U256,
    amount_out_minimum: U256,
) -> EngineResult<Bytes> {
    let mut fields = vec![Token::Bytes(path), Token::Address(recipient)];
    if dialect.has_deadline() {
        fields.push(Token::Uint(deadline));
    }
    fields.push(Token::Uint(amount_in));
    fields.push(Token::Uint(amount_out_minimum));
    encode(
        V3SwapMethod::ExactInput.function(dialect),
        &[Token::Tuple(fields)],
    )
}

/// Quoter quoteExactInputSingle(address tokenIn, address tokenOut, uint24 fee, uint256 amountIn, uint160 sqrtPriceLimitX96)
pub static QUOTE_EXACT_INPUT_SINGLE: Lazy<Function> = Lazy::new(|| {
    function(
        "quoteExactInputSingle",
        &[
            ("tokenIn", ParamType::Address),
            ("tokenOut", ParamType::Address),
            ("fee", ParamType::Uint(24)),
            ("amountIn", ParamType::Uint(256)),
            ("sqrtPriceLimitX96", ParamType::Uint(160)),
        ],
        &[("amountOut", ParamType::Uint(256))],
        StateMutability::NonPayable,
    )
});

/// Factory getPool(address tokenA, address tokenB, uint24 fee)
pub static GET_POOL: Lazy<Function> = Lazy::new(|| {
    function(
        "getPool",
        &[
            ("tokenA", ParamType::Address),
            ("tokenB", ParamType::Address),
            ("fee", ParamType::Uint(24)),
        ],
        &[("pool", ParamType::Address)],
        StateMutability::View,
    )
});

/// Pool slot0()
pub static SLOT0: Lazy<Function> = Lazy::new(|| {
    function(
        "slot0",
        &[],
        &[
            ("sqrtPriceX96", ParamType::Uint(160)),
            ("tick", ParamType::Int(24)),
            ("observationIndex", ParamType::Uint(16)),
            ("observationCardinality", ParamType::Uint(16)),
            ("observationCardinalityNext", ParamType::Uint(16)),
            ("feeProtocol", ParamType::Uint(8)),
            ("unlocked", ParamType::Bool),
        ],
        StateMutability::View,
    )
});

/// Pool liquidity()
pub static LIQUIDITY: Lazy<Function> = Lazy::new(|| {
    function(
        "liquidity",
        &[],
        &[("", ParamType::Uint(128))],
        StateMutability::View,
    )
});

pub fn encode_quote_exact_input_single(
    token_in: Address,
    token_out: Address,
    fee: u32,
    amount_in: U256,
) -> EngineResult<Bytes> {
    encode(
        &QUOTE_EXACT_INPUT_SINGLE,
        &[
            Token::Address(token_in),
            Token::Address(token_out),
            Token::Uint(U256::from(fee)),
            Token::Uint(amount_in),
            Token::Uint(U256::zero()),
        ],
    )
}

pub fn decode_quoted_amount(data: &[u8]) -> Result<U256, DecodeError> {
    let tokens = decode_output(&QUOTE_EXACT_INPUT_SINGLE, data)?;
    Tokens::new(&tokens).uint(0, "amountOut")
}

pub fn encode_get_pool(token_a: Address, token_b: Address, fee: u32) -> EngineResult<Bytes> {
    encode(
        &GET_POOL,
        &[
            Token::Address(token_a),
            Token::Address(token_b),
            Token::Uint(U256::from(fee)),
        ],
    )
}

pub fn decode_pool(data: &[u8]) -> Result<Address, DecodeError> {
    let tokens = decode_output(&GET_POOL, data)?;
    Tokens::new(&tokens).address(0, "pool")
}

pub fn encode_slot0() -> EngineResult<Bytes> {
    encode(&SLOT0, &[])
}

/// `sqrtPriceX96` from a `slot0()` result
pub fn decode_sqrt_price(data: &[u8]) -> Result<U256, DecodeError> {
    let tokens = decode_output(&SLOT0, data)?;
    Tokens::new(&tokens).uint(0, "sqrtPriceX96")
}

pub fn encode_liquidity() -> EngineResult<Bytes> {
    encode(&LIQUIDITY, &[])
}

pub fn decode_liquidity(data: &[u8]) -> Result<u128, DecodeError> {
    let tokens = decode_output(&LIQUIDITY, data)?;
    let liquidity = Tokens::new(&tokens).uint(0, "liquidity")?;
    if liquidity > U256::from(u128::MAX) {
        return Err(DecodeError::Abi("liquidity exceeds uint128".into()));
    }
    Ok(liquidity.as_u128())
}
