//! Shared DEX functionality library
//!
//! Everything the engine needs to speak to DEX routers on-chain: ABI
//! definitions, the read-only mempool decoder and the swap encoders used to
//! build bundles. Decoder and encoders share the same ABI tables so their
//! outputs stay symmetric.
//!
//! # Architecture
//!
//! ```text
//! dex_utils/
//! ├── abi/          # Function tables per protocol
//! │   ├── erc20.rs             # approve
//! │   ├── executor.rs          # flash-loan executor entry point
//! │   ├── uniswap_v2.rs        # V2 router, factory and pair
//! │   ├── uniswap_v3.rs        # V3 routers, quoter and pool
//! │   └── universal_router.rs  # command streams
//! ├── path.rs       # packed V3 paths
//! ├── registry.rs   # router address -> (DEX, dialect)
//! ├── decoder.rs    # pending transaction -> DecodedSwap
//! └── encoder.rs    # Hop -> swap calldata
//! ```

pub mod abi;
pub mod decoder;
pub mod encoder;
pub mod path;
pub mod registry;

pub use abi::{DecodeError, SwapArgs};
pub use decoder::{MempoolDecoder, NATIVE_SENTINEL};
pub use encoder::{encoder_for, EncodeContext, SwapEncoder, V2RouterEncoder, V3RouterEncoder};
pub use registry::{RouterFamily, RouterInfo, RouterRegistry, WETH};
