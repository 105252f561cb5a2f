//! # Unified Types Library
//!
//! Shared data model for the cross-DEX arbitrage engine: tokens, quotes, hops,
//! closed-loop routes, bundle calls, decoded mempool swaps and the error
//! taxonomy every service reports through.
//!
//! ## Design Philosophy
//!
//! - **No Precision Loss**: on-chain quantities are `U256` in smallest token units
//! - **Validated Construction**: a [`Route`] cannot be built unless it is a closed
//!   loop with chained amounts and no repeated intermediate token
//! - **Closed Venue Set**: [`DexKind`] is an enum, so adapters and encoders are
//!   chosen by `match` and an unsupported venue is an explicit error
//! - **Clear Boundaries**: [`common::units`] is the only place amounts turn into
//!   human-readable decimals (logging and reports)
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{DexKind, Hop, Route};
//! use ethers::types::{Address, U256};
//!
//! let weth = Address::repeat_byte(0x11);
//! let usdc = Address::repeat_byte(0x22);
//! let router = Address::repeat_byte(0xaa);
//! let hops = vec![
//!     Hop::new(DexKind::UniswapV2, router, weth, usdc, U256::from(100u64), U256::from(180u64)),
//!     Hop::new(DexKind::SushiswapV2, router, usdc, weth, U256::from(180u64), U256::from(110u64)),
//! ];
//! let route = Route::new(weth, hops, U256::from(2u64)).unwrap();
//! assert_eq!(route.net_profit, U256::from(8u64));
//! ```

pub mod bundle;
pub mod common;
pub mod dex;
pub mod quote;
pub mod route;
pub mod swap;
pub mod tokens;

pub use bundle::{Bundle, Call, CallKind, FlashLoanRequest};
pub use common::errors::{EngineError, EngineResult};
pub use common::units::{format_amount, to_decimal};
pub use dex::DexKind;
pub use quote::{Hop, Quote};
pub use route::Route;
pub use swap::DecodedSwap;
pub use tokens::TokenInfo;

pub use ethers::types::{Address, Bytes, H256, U256};
