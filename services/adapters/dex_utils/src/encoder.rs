//! Per-DEX swap calldata encoders
//!
//! The encoder for a hop is chosen by a `match` on its [`DexKind`]; venues
//! without an encoder are explicit construction errors upstream.

use crate::abi::uniswap_v2::encode_swap_exact_tokens_for_tokens;
use crate::abi::uniswap_v3::{encode_exact_input, encode_exact_input_single, V3Dialect};
use crate::path::encode_path;
use ethers::types::{Address, Bytes, U256};
use types::{DexKind, EngineError, EngineResult, Hop};

const BPS: u64 = 10_000;

/// Parameters shared by every swap in a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeContext {
    /// Receiver of swap output, normally the executor contract
    pub recipient: Address,
    pub deadline: U256,
    /// Tolerance applied to each hop's quoted output
    pub slippage_bps: u32,
}

impl EncodeContext {
    /// Quoted output reduced by the slippage tolerance
    pub fn min_amount_out(&self, quoted: U256) -> EngineResult<U256> {
        if u64::from(self.slippage_bps) > BPS {
            return Err(EngineError::construction(format!(
                "slippage {} bps exceeds 100%",
                self.slippage_bps
            )));
        }
        let keep = U256::from(BPS - u64::from(self.slippage_bps));
        Ok(match quoted.checked_mul(keep) {
            Some(scaled) => scaled / U256::from(BPS),
            None => quoted / U256::from(BPS) * keep,
        })
    }
}

pub trait SwapEncoder: Send + Sync {
    /// Calldata for one hop sent to `hop.router`
    fn encode_swap(&self, hop: &Hop, ctx: &EncodeContext) -> EngineResult<Bytes>;

    /// Calldata for a whole multi-hop path in one router call. `fees` is
    /// ignored by venues without fee tiers.
    fn encode_path_swap(
        &self,
        path: &[Address],
        fees: &[u32],
        amount_in: U256,
        amount_out_min: U256,
        ctx: &EncodeContext,
    ) -> EngineResult<Bytes>;
}

/// UniswapV2Router02 `swapExactTokensForTokens`
#[derive(Debug, Clone, Copy, Default)]
pub struct V2RouterEncoder;

impl SwapEncoder for V2RouterEncoder {
    fn encode_swap(&self, hop: &Hop, ctx: &EncodeContext) -> EngineResult<Bytes> {
        encode_swap_exact_tokens_for_tokens(
            hop.amount_in,
            ctx.min_amount_out(hop.amount_out)?,
            &[hop.token_in, hop.token_out],
            ctx.recipient,
            ctx.deadline,
        )
    }

    fn encode_path_swap(
        &self,
        path: &[Address],
        _fees: &[u32],
        amount_in: U256,
        amount_out_min: U256,
        ctx: &EncodeContext,
    ) -> EngineResult<Bytes> {
        if path.len() < 2 {
            return Err(EngineError::construction("swap path needs two tokens"));
        }
        encode_swap_exact_tokens_for_tokens(
            amount_in,
            amount_out_min,
            path,
            ctx.recipient,
            ctx.deadline,
        )
    }
}

/// V3 `exactInputSingle` / `exactInput` for either router generation
#[derive(Debug, Clone, Copy)]
pub struct V3RouterEncoder {
    dialect: V3Dialect,
}

impl V3RouterEncoder {
    pub const fn new(dialect: V3Dialect) -> Self {
        Self { dialect }
    }
}

impl SwapEncoder for V3RouterEncoder {
    fn encode_swap(&self, hop: &Hop, ctx: &EncodeContext) -> EngineResult<Bytes> {
        let fee = hop.fee_tier.ok_or_else(|| {
            EngineError::construction(format!("{} hop without fee tier", hop.dex))
        })?;
        encode_exact_input_single(
            self.dialect,
            hop.token_in,
            hop.token_out,
            fee,
            ctx.recipient,
            ctx.deadline,
            hop.amount_in,
            ctx.min_amount_out(hop.amount_out)?,
        )
    }

    fn encode_path_swap(
        &self,
        path: &[Address],
        fees: &[u32],
        amount_in: U256,
        amount_out_min: U256,
        ctx: &EncodeContext,
    ) -> EngineResult<Bytes> {
        encode_exact_input(
            self.dialect,
            encode_path(path, fees)?,
            ctx.recipient,
            ctx.deadline,
            amount_in,
            amount_out_min,
        )
    }
}

static V2_ROUTER: V2RouterEncoder = V2RouterEncoder;
static V3_SWAP_ROUTER: V3RouterEncoder = V3RouterEncoder::new(V3Dialect::SwapRouter);
static V3_SWAP_ROUTER_02: V3RouterEncoder = V3RouterEncoder::new(V3Dialect::SwapRouter02);

/// Encoder for a venue, `None` when swaps on it cannot be built directly
pub fn encoder_for(dex: DexKind) -> Option<&'static dyn SwapEncoder> {
    match dex {
        DexKind::UniswapV2 | DexKind::SushiswapV2 | DexKind::PancakeswapV2 => Some(&V2_ROUTER),
        DexKind::UniswapV3 | DexKind::SushiswapV3 => Some(&V3_SWAP_ROUTER),
        DexKind::PancakeswapV3 => Some(&V3_SWAP_ROUTER_02),
        DexKind::UniversalRouter => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(slippage_bps: u32) -> EncodeContext {
        EncodeContext {
            recipient: Address::repeat_byte(0xee),
            deadline: U256::from(1_700_000_000u64),
            slippage_bps,
        }
    }

    #[test]
    fn test_min_amount_out() {
        assert_eq!(ctx(50).min_amount_out(U256::from(10_000)).unwrap(), U256::from(9_950));
        assert_eq!(ctx(0).min_amount_out(U256::from(7)).unwrap(), U256::from(7));
        assert!(ctx(10_001).min_amount_out(U256::from(7)).is_err());
    }

    #[test]
    fn test_v3_requires_fee_tier() {
        let hop = Hop::new(
            DexKind::UniswapV3,
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Address::repeat_byte(3),
            U256::from(100),
            U256::from(90),
        );
        let err = encoder_for(DexKind::UniswapV3)
            .unwrap()
            .encode_swap(&hop, &ctx(0))
            .unwrap_err();
        assert!(matches!(err, EngineError::Construction { .. }));
        assert!(encoder_for(DexKind::UniversalRouter).is_none());
    }
}
