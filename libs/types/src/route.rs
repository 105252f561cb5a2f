//! Closed-loop arbitrage routes

use crate::common::errors::EngineError;
use crate::quote::Hop;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A profitable sequence of hops that starts and ends at `base_token`.
///
/// Invariants enforced by [`Route::new`]:
/// - `hops[0].token_in == hops[last].token_out == base_token`
/// - `hops[i].token_out == hops[i + 1].token_in` and amounts chain
/// - no intermediate token appears twice
/// - `net_profit = final_out - initial_in - gas_cost > 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub base_token: Address,
    pub hops: Vec<Hop>,
    /// Gas cost expressed in base-token units
    pub gas_cost: U256,
    pub net_profit: U256,
}

impl Route {
    pub fn new(base_token: Address, hops: Vec<Hop>, gas_cost: U256) -> Result<Self, EngineError> {
        Self::validate_loop(base_token, &hops)?;

        let net = Self::gross_profit(&hops)
            .and_then(|gross| gross.checked_sub(gas_cost))
            .filter(|net| !net.is_zero());

        match net {
            Some(net_profit) => Ok(Self {
                base_token,
                hops,
                gas_cost,
                net_profit,
            }),
            None => Err(EngineError::InsufficientProfit {
                net_profit: U256::zero(),
                threshold: U256::zero(),
            }),
        }
    }

    /// Check the closed-loop, chaining and no-revisit invariants
    pub fn validate_loop(base_token: Address, hops: &[Hop]) -> Result<(), EngineError> {
        let (first, last) = match (hops.first(), hops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(EngineError::construction("route has no hops")),
        };

        if first.token_in != base_token || last.token_out != base_token {
            return Err(EngineError::construction(format!(
                "route is not a closed loop at {:?}",
                base_token
            )));
        }

        for pair in hops.windows(2) {
            if pair[0].token_out != pair[1].token_in {
                return Err(EngineError::construction(format!(
                    "hop output {:?} does not feed next input {:?}",
                    pair[0].token_out, pair[1].token_in
                )));
            }
            if pair[0].amount_out != pair[1].amount_in {
                return Err(EngineError::construction(
                    "hop amounts do not chain".to_string(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for hop in &hops[..hops.len() - 1] {
            if hop.token_out == base_token || !seen.insert(hop.token_out) {
                return Err(EngineError::construction(format!(
                    "intermediate token {:?} visited twice",
                    hop.token_out
                )));
            }
        }

        Ok(())
    }

    /// `final_out - initial_in` when positive
    pub fn gross_profit(hops: &[Hop]) -> Option<U256> {
        let initial = hops.first()?.amount_in;
        let final_out = hops.last()?.amount_out;
        final_out.checked_sub(initial).filter(|gross| !gross.is_zero())
    }

    pub fn amount_in(&self) -> U256 {
        self.hops.first().map(|hop| hop.amount_in).unwrap_or_default()
    }

    pub fn amount_out(&self) -> U256 {
        self.hops.last().map(|hop| hop.amount_out).unwrap_or_default()
    }

    /// Sum of per-hop gas estimates
    pub fn hop_gas(&self) -> u64 {
        self.hops.iter().map(|hop| hop.estimated_gas).sum()
    }

    /// Token path including the closing base token
    pub fn token_path(&self) -> Vec<Address> {
        let mut path = Vec::with_capacity(self.hops.len() + 1);
        path.push(self.base_token);
        path.extend(self.hops.iter().map(|hop| hop.token_out));
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::DexKind;

    fn token(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn hop(token_in: u8, token_out: u8, amount_in: u64, amount_out: u64) -> Hop {
        Hop::new(
            DexKind::UniswapV2,
            Address::repeat_byte(0xaa),
            token(token_in),
            token(token_out),
            U256::from(amount_in),
            U256::from(amount_out),
        )
    }

    #[test]
    fn test_net_profit() {
        let route = Route::new(
            token(1),
            vec![hop(1, 2, 1_000, 1_800), hop(2, 1, 1_800, 1_050)],
            U256::from(20u64),
        )
        .unwrap();
        assert_eq!(route.net_profit, U256::from(30u64));
        assert_eq!(route.token_path(), vec![token(1), token(2), token(1)]);
        assert_eq!(route.hop_gas(), 220_000);
    }

    #[test]
    fn test_rejects_open_loop() {
        let err = Route::new(
            token(1),
            vec![hop(1, 2, 1_000, 1_800), hop(2, 3, 1_800, 1_900)],
            U256::zero(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Construction { .. }));
    }

    #[test]
    fn test_rejects_repeated_intermediate() {
        let err = Route::new(
            token(1),
            vec![
                hop(1, 2, 100, 200),
                hop(2, 3, 200, 300),
                hop(3, 2, 300, 400),
                hop(2, 1, 400, 500),
            ],
            U256::zero(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Construction { .. }));
    }

    #[test]
    fn test_rejects_broken_amount_chain() {
        let err = Route::new(
            token(1),
            vec![hop(1, 2, 100, 200), hop(2, 1, 150, 300)],
            U256::zero(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Construction { .. }));
    }

    #[test]
    fn test_gas_eats_profit() {
        let err = Route::new(
            token(1),
            vec![hop(1, 2, 1_000, 1_800), hop(2, 1, 1_800, 1_050)],
            U256::from(50u64),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientProfit { .. }));
    }

    proptest::proptest! {
        #[test]
        fn prop_net_profit_matches_amounts(
            amount_in in 1u64..1_000_000_000,
            mid in 1u64..1_000_000_000,
            out in 1u64..2_000_000_000,
            gas in 0u64..1_000_000,
        ) {
            let result = Route::new(
                token(1),
                vec![hop(1, 2, amount_in, mid), hop(2, 1, mid, out)],
                U256::from(gas),
            );
            match result {
                Ok(route) => {
                    proptest::prop_assert!(out > amount_in + gas);
                    proptest::prop_assert_eq!(route.net_profit, U256::from(out - amount_in - gas));
                    let path = route.token_path();
                    proptest::prop_assert_eq!(path.first(), path.last());
                }
                Err(e) => {
                    proptest::prop_assert!(out <= amount_in + gas);
                    proptest::prop_assert!(matches!(e, EngineError::InsufficientProfit { .. }), "unexpected {:?}", e);
                }
            }
        }
    }
}
