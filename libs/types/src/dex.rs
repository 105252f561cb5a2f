//! DEX venue identification

use crate::common::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported DEX venues
///
/// Quote adapters, swap encoders and router classification all key on this
/// enum. Forks that share an ABI with Uniswap get their own variant so quotes
/// and logs keep the venue name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexKind {
    UniswapV2,
    SushiswapV2,
    PancakeswapV2,
    UniswapV3,
    SushiswapV3,
    PancakeswapV3,
    /// Command-stream router; decodable but never used as a bundle hop
    UniversalRouter,
}

impl DexKind {
    pub const ALL: [DexKind; 7] = [
        DexKind::UniswapV2,
        DexKind::SushiswapV2,
        DexKind::PancakeswapV2,
        DexKind::UniswapV3,
        DexKind::SushiswapV3,
        DexKind::PancakeswapV3,
        DexKind::UniversalRouter,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DexKind::UniswapV2 => "uniswap_v2",
            DexKind::SushiswapV2 => "sushiswap_v2",
            DexKind::PancakeswapV2 => "pancakeswap_v2",
            DexKind::UniswapV3 => "uniswap_v3",
            DexKind::SushiswapV3 => "sushiswap_v3",
            DexKind::PancakeswapV3 => "pancakeswap_v3",
            DexKind::UniversalRouter => "universal_router",
        }
    }

    /// Constant-product pools with a path-array router
    pub fn is_v2(&self) -> bool {
        matches!(
            self,
            DexKind::UniswapV2 | DexKind::SushiswapV2 | DexKind::PancakeswapV2
        )
    }

    /// Concentrated-liquidity pools with fee tiers
    pub fn is_v3(&self) -> bool {
        matches!(
            self,
            DexKind::UniswapV3 | DexKind::SushiswapV3 | DexKind::PancakeswapV3
        )
    }

    /// Constant-product venue of the same protocol; SwapRouter02-style routers
    /// serve both pool generations
    pub fn v2_counterpart(&self) -> Option<DexKind> {
        match self {
            DexKind::UniswapV2 | DexKind::UniswapV3 => Some(DexKind::UniswapV2),
            DexKind::SushiswapV2 | DexKind::SushiswapV3 => Some(DexKind::SushiswapV2),
            DexKind::PancakeswapV2 | DexKind::PancakeswapV3 => Some(DexKind::PancakeswapV2),
            DexKind::UniversalRouter => None,
        }
    }

    /// Typical gas used by one swap through this venue's router
    pub fn default_swap_gas(&self) -> u64 {
        match self {
            DexKind::UniswapV2 | DexKind::SushiswapV2 | DexKind::PancakeswapV2 => 110_000,
            DexKind::UniswapV3 | DexKind::SushiswapV3 | DexKind::PancakeswapV3 => 150_000,
            DexKind::UniversalRouter => 180_000,
        }
    }
}

impl fmt::Display for DexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DexKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        DexKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| EngineError::config(format!("unknown dex kind '{}'", s)))
    }
}
