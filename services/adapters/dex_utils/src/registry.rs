//! Router address registry
//!
//! Maps router addresses to the DEX they belong to and the ABI dialect they
//! speak.

use ethers::types::{Address, H160};
use hex_literal::hex;
use std::collections::HashMap;
use types::DexKind;

pub const UNISWAP_V2_ROUTER: Address = H160(hex!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"));
pub const SUSHISWAP_ROUTER: Address = H160(hex!("d9e1cE17f2641f24aE83637ab66a2cca9C378B9F"));
pub const UNISWAP_V3_ROUTER: Address = H160(hex!("E592427A0AEce92De3Edee1F18E0157C05861564"));
pub const UNISWAP_V3_ROUTER_02: Address = H160(hex!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45"));
pub const UNIVERSAL_ROUTER: Address = H160(hex!("3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD"));
pub const UNIVERSAL_ROUTER_LEGACY: Address = H160(hex!("Ef1c6E67703c7BD7107eed8303Fbe6EC2554BF6B"));
pub const PANCAKESWAP_V3_ROUTER: Address = H160(hex!("13f4EA83D0bd40E75C8222255bc855a974568Dd4"));

/// Mainnet WETH
pub const WETH: Address = H160(hex!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"));

/// Calldata dialects a router understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouterFamily {
    /// UniswapV2Router02-style `address[]` path methods
    V2Router,
    /// SwapRouter structs with `deadline`
    V3SwapRouter,
    /// SwapRouter02: V3 structs without deadline plus V2 methods without deadline
    V3SwapRouter02,
    /// Command stream `execute`
    UniversalRouter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterInfo {
    pub dex: DexKind,
    pub family: RouterFamily,
}

#[derive(Debug, Clone, Default)]
pub struct RouterRegistry {
    routers: HashMap<Address, RouterInfo>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Well-known Ethereum mainnet routers
    pub fn mainnet() -> Self {
        let mut registry = Self::new();
        registry.register(UNISWAP_V2_ROUTER, DexKind::UniswapV2, RouterFamily::V2Router);
        registry.register(SUSHISWAP_ROUTER, DexKind::SushiswapV2, RouterFamily::V2Router);
        registry.register(UNISWAP_V3_ROUTER, DexKind::UniswapV3, RouterFamily::V3SwapRouter);
        registry.register(
            UNISWAP_V3_ROUTER_02,
            DexKind::UniswapV3,
            RouterFamily::V3SwapRouter02,
        );
        registry.register(
            PANCAKESWAP_V3_ROUTER,
            DexKind::PancakeswapV3,
            RouterFamily::V3SwapRouter02,
        );
        registry.register(
            UNIVERSAL_ROUTER,
            DexKind::UniversalRouter,
            RouterFamily::UniversalRouter,
        );
        registry.register(
            UNIVERSAL_ROUTER_LEGACY,
            DexKind::UniversalRouter,
            RouterFamily::UniversalRouter,
        );
        registry
    }

    pub fn register(&mut self, router: Address, dex: DexKind, family: RouterFamily) {
        self.routers.insert(router, RouterInfo { dex, family });
    }

    pub fn lookup(&self, router: &Address) -> Option<RouterInfo> {
        self.routers.get(router).copied()
    }

    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}
