//! Quotes and hops

use crate::dex::DexKind;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Output amount offered by one DEX for a given input.
///
/// Quotes are tied to the exact `amount_in` they were requested for and are
/// never cached across amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub dex: DexKind,
    /// Router the swap would be sent to
    pub router: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub estimated_gas: u64,
    /// V3 pool fee tier in hundredths of a bip, when applicable
    pub fee_tier: Option<u32>,
}

impl Quote {
    pub fn is_positive(&self) -> bool {
        !self.amount_out.is_zero()
    }

    /// Turn a quote into a route hop between the given tokens
    pub fn into_hop(self, token_in: Address, token_out: Address) -> Hop {
        Hop {
            dex: self.dex,
            router: self.router,
            token_in,
            token_out,
            amount_in: self.amount_in,
            amount_out: self.amount_out,
            fee_tier: self.fee_tier,
            estimated_gas: self.estimated_gas,
        }
    }
}

/// One swap step inside a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub dex: DexKind,
    pub router: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_tier: Option<u32>,
    pub estimated_gas: u64,
}

impl Hop {
    /// Hop with the venue's default gas estimate and no fee tier
    pub fn new(
        dex: DexKind,
        router: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        amount_out: U256,
    ) -> Self {
        Self {
            dex,
            router,
            token_in,
            token_out,
            amount_in,
            amount_out,
            fee_tier: None,
            estimated_gas: dex.default_swap_gas(),
        }
    }

    pub fn with_fee_tier(mut self, fee_tier: u32) -> Self {
        self.fee_tier = Some(fee_tier);
        self
    }

    pub fn with_estimated_gas(mut self, gas: u64) -> Self {
        self.estimated_gas = gas;
        self
    }
}
