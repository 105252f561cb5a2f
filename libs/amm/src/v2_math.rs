//! Uniswap V2 AMM math with exact integer calculations
//!
//! Mirrors `UniswapV2Library.getAmountOut` / `getAmountIn` with the fee
//! expressed in basis points (30 = 0.3%).

use anyhow::{anyhow, bail, Result};
use ethers::types::U256;

const BPS: u64 = 10_000;

/// Pool reserves and fee structure for V2 AMMs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V2PoolState {
    pub reserve_in: U256,
    pub reserve_out: U256,
    pub fee_bps: u32, // Fee in basis points (30 = 0.3%)
}

impl V2PoolState {
    /// Orient `(reserve0, reserve1)` for a swap starting from token0 or token1
    pub fn oriented(reserve0: U256, reserve1: U256, zero_for_one: bool, fee_bps: u32) -> Self {
        let (reserve_in, reserve_out) = if zero_for_one {
            (reserve0, reserve1)
        } else {
            (reserve1, reserve0)
        };
        Self {
            reserve_in,
            reserve_out,
            fee_bps,
        }
    }

    pub fn amount_out(&self, amount_in: U256) -> Result<U256> {
        V2Math::calculate_output_amount(amount_in, self.reserve_in, self.reserve_out, self.fee_bps)
    }
}

/// V2 AMM math functions
pub struct V2Math;

impl V2Math {
    /// Exact output amount for Uniswap V2 using the x*y=k formula
    ///
    /// `out = in·(10000−fee)·R_out / (R_in·10000 + in·(10000−fee))`
    pub fn calculate_output_amount(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
        fee_bps: u32,
    ) -> Result<U256> {
        if amount_in.is_zero() {
            bail!("Input amount must be positive");
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            bail!("Reserves must be positive");
        }
        let fee_multiplier = Self::fee_multiplier(fee_bps)?;

        let amount_in_with_fee = amount_in
            .checked_mul(fee_multiplier)
            .ok_or_else(|| anyhow!("Overflow applying fee"))?;
        let numerator = amount_in_with_fee
            .checked_mul(reserve_out)
            .ok_or_else(|| anyhow!("Overflow in numerator"))?;
        let denominator = reserve_in
            .checked_mul(U256::from(BPS))
            .and_then(|r| r.checked_add(amount_in_with_fee))
            .ok_or_else(|| anyhow!("Overflow in denominator"))?;

        Ok(numerator / denominator)
    }

    /// Required input for a desired output (reverse calculation, rounded up)
    pub fn calculate_input_amount(
        amount_out: U256,
        reserve_in: U256,
        reserve_out: U256,
        fee_bps: u32,
    ) -> Result<U256> {
        if amount_out.is_zero() {
            bail!("Output amount must be positive");
        }
        if amount_out >= reserve_out {
            bail!("Insufficient liquidity: output exceeds reserves");
        }
        let fee_multiplier = Self::fee_multiplier(fee_bps)?;

        let numerator = reserve_in
            .checked_mul(amount_out)
            .and_then(|n| n.checked_mul(U256::from(BPS)))
            .ok_or_else(|| anyhow!("Overflow in numerator"))?;
        let denominator = (reserve_out - amount_out)
            .checked_mul(fee_multiplier)
            .ok_or_else(|| anyhow!("Overflow in denominator"))?;

        Ok(numerator / denominator + U256::one())
    }

    fn fee_multiplier(fee_bps: u32) -> Result<U256> {
        if u64::from(fee_bps) >= BPS {
            bail!("Fee {} bps leaves nothing to swap", fee_bps);
        }
        Ok(U256::from(BPS - u64::from(fee_bps)))
    }
}
