//! Uniswap V3 single-tick estimates
//!
//! Uses the pool's current `sqrtPriceX96` and in-range `liquidity` only. A
//! swap that would cross into the next initialized tick is priced as if the
//! current liquidity extended indefinitely, so results are upper-bound
//! approximations for large trades.

use anyhow::{anyhow, bail, Result};
use ethers::types::{U256, U512};
use rust_decimal::Decimal;

/// Fee denominator in pips (3000 = 0.3%)
const PIPS: u64 = 1_000_000;

/// V3 pool state read from `slot0()` and `liquidity()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V3PoolState {
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub fee_pips: u32,
}

/// V3 AMM math
pub struct V3Math;

impl V3Math {
    fn q96() -> U256 {
        U256::one() << 96
    }

    /// Estimated output for `amount_in`, assuming no tick is crossed
    ///
    /// token0 in (`zero_for_one`): `√P' = L·√P / (L + in·√P/Q96)`, `out = L·(√P − √P')/Q96`
    /// token1 in: `√P' = √P + in·Q96/L`, `out = L·Q96·(√P' − √P) / (√P'·√P)`
    pub fn estimate_output_amount(
        amount_in: U256,
        pool: &V3PoolState,
        zero_for_one: bool,
    ) -> Result<U256> {
        if amount_in.is_zero() {
            bail!("Input amount must be positive");
        }
        if pool.liquidity == 0 || pool.sqrt_price_x96.is_zero() {
            bail!("No liquidity in range");
        }
        if u64::from(pool.fee_pips) >= PIPS {
            bail!("Fee {} pips leaves nothing to swap", pool.fee_pips);
        }

        let amount_in = mul_div(
            amount_in,
            U256::from(PIPS - u64::from(pool.fee_pips)),
            U256::from(PIPS),
        )?;
        let liquidity = U256::from(pool.liquidity);
        let sqrt_price = pool.sqrt_price_x96;
        let q96 = Self::q96();

        if zero_for_one {
            // L·Q96·√P / (L·Q96 + in·√P)
            let lq = U512::from(liquidity) * U512::from(q96);
            let numerator = lq * U512::from(sqrt_price);
            let denominator = lq + amount_in.full_mul(sqrt_price);
            let new_sqrt_price = narrow(numerator / denominator)?;
            let delta = sqrt_price.saturating_sub(new_sqrt_price);
            mul_div(liquidity, delta, q96)
        } else {
            let new_sqrt_price = sqrt_price
                .checked_add(mul_div(amount_in, q96, liquidity)?)
                .ok_or_else(|| anyhow!("Price overflow"))?;
            let delta = new_sqrt_price - sqrt_price;
            // L·Q96·Δ / √P' / √P
            let step = mul_div(liquidity << 96, delta, new_sqrt_price)?;
            Ok(step / sqrt_price)
        }
    }

    /// Virtual reserves `(x, y) = (L·Q96/√P, L·√P/Q96)` for the current tick
    pub fn virtual_reserves(pool: &V3PoolState) -> Result<(U256, U256)> {
        if pool.sqrt_price_x96.is_zero() {
            bail!("Uninitialized pool");
        }
        let liquidity = U256::from(pool.liquidity);
        let reserve0 = mul_div(liquidity, Self::q96(), pool.sqrt_price_x96)?;
        let reserve1 = mul_div(liquidity, pool.sqrt_price_x96, Self::q96())?;
        Ok((reserve0, reserve1))
    }

    /// Human price of token0 in token1, adjusted for decimals
    pub fn sqrt_price_to_price(
        sqrt_price_x96: U256,
        decimals0: u8,
        decimals1: u8,
    ) -> Result<Decimal> {
        const SCALE: u32 = 18;
        // price·10^18 = √P²·10^18 / 2^192
        let squared = sqrt_price_x96.full_mul(sqrt_price_x96);
        let scaled = squared * U512::from(U256::exp10(SCALE as usize)) >> 192;
        let raw = narrow(scaled)?;
        if raw > U256::from(i128::MAX as u128) {
            bail!("Price out of Decimal range");
        }
        let mut price = Decimal::try_from_i128_with_scale(raw.as_u128() as i128, SCALE)
            .map_err(|e| anyhow!("Price out of Decimal range: {}", e))?;

        let shift = i32::from(decimals0) - i32::from(decimals1);
        if shift.unsigned_abs() > 28 {
            bail!("Decimal gap {} exceeds Decimal precision", shift);
        }
        let factor = Decimal::from_i128_with_scale(10i128.pow(shift.unsigned_abs()), 0);
        if shift > 0 {
            price = price
                .checked_mul(factor)
                .ok_or_else(|| anyhow!("Price overflow"))?;
        } else if shift < 0 {
            price /= factor;
        }
        Ok(price)
    }
}

/// `a·b/denominator` with a 512-bit intermediate
fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        bail!("Division by zero");
    }
    narrow(a.full_mul(b) / U512::from(denominator))
}

fn narrow(value: U512) -> Result<U256> {
    U256::try_from(value).map_err(|_| anyhow!("Result exceeds 256 bits"))
}
