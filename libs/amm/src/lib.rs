//! # AMM Library - DEX Swap Mathematics
//!
//! ## Purpose
//!
//! Local swap math for quote adapters that read pool state directly instead of
//! asking a router or quoter contract. All amounts are `U256` in smallest
//! token units; intermediate products widen to `U512` where they can overflow.
//!
//! ## Precision
//!
//! - [`V2Math`] reproduces the Uniswap V2 router formula bit-for-bit
//!   (`getAmountOut` / `getAmountIn`), so reserve-based quotes match on-chain
//!   results for the same reserves
//! - [`V3Math`] is a best-effort estimate: it assumes the swap stays inside
//!   the current tick's liquidity and ignores tick crossings. Large trades
//!   against thin ranges are overestimated; callers must treat the result as
//!   an approximation, never as an executable quote
//!
//! ## Integration Points
//!
//! - **Input Sources**: `getReserves()`, `slot0()` and `liquidity()` results
//! - **Output Destinations**: quote adapters feeding the quote aggregator

pub mod v2_math;
pub mod v3_math;

pub use v2_math::{V2Math, V2PoolState};
pub use v3_math::{V3Math, V3PoolState};
