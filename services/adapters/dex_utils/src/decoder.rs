//! Mempool swap decoder
//!
//! Classifies a pending transaction by its destination router, parses the
//! calldata with the dialects that router speaks and normalises the result
//! into a [`DecodedSwap`]. Decoding is pure: no chain access, no state.

use crate::abi::uniswap_v2::V2SwapMethod;
use crate::abi::uniswap_v3::{decode_multicall, V3Dialect, V3SwapMethod};
use crate::abi::universal_router::{
    address_this, contract_balance, decode_execute, msg_sender, RouterCommand,
};
use crate::abi::{selector, DecodeError, SwapArgs};
use crate::registry::{RouterFamily, RouterInfo, RouterRegistry};
use ethers::types::{Address, Transaction, H160, U256};
use hex_literal::hex;
use tracing::trace;
use types::{DecodedSwap, DexKind};

/// Placeholder address some routers and aggregators use for native ETH
pub const NATIVE_SENTINEL: Address = H160(hex!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"));

/// Nested `multicall` levels followed before giving up
const MAX_MULTICALL_DEPTH: usize = 2;

#[derive(Debug, Clone)]
pub struct MempoolDecoder {
    registry: RouterRegistry,
    wrapped_native: Address,
}

impl MempoolDecoder {
    pub fn new(registry: RouterRegistry, wrapped_native: Address) -> Self {
        Self {
            registry,
            wrapped_native,
        }
    }

    pub fn registry(&self) -> &RouterRegistry {
        &self.registry
    }

    /// Decoded swap, or `None` for unknown routers and malformed calldata
    pub fn decode(&self, tx: &Transaction) -> Option<DecodedSwap> {
        match self.try_decode(tx) {
            Ok(swap) => Some(swap),
            Err(e) => {
                trace!("Skipping {:?}: {}", tx.hash, e);
                None
            }
        }
    }

    pub fn try_decode(&self, tx: &Transaction) -> Result<DecodedSwap, DecodeError> {
        let router = tx.to.ok_or(DecodeError::ContractCreation)?;
        let info = self
            .registry
            .lookup(&router)
            .ok_or(DecodeError::UnknownRouter(router))?;

        let (dex, args) = self.decode_calldata(info, &tx.input, tx.value, 0)?;
        let uses_sentinels = matches!(
            info.family,
            RouterFamily::V3SwapRouter02 | RouterFamily::UniversalRouter
        );

        let path: Vec<Address> = args
            .path
            .iter()
            .map(|token| self.substitute_native(*token))
            .collect();
        let (token_in, token_out) = match (path.first(), path.last()) {
            (Some(first), Some(last)) if path.len() >= 2 => (*first, *last),
            _ => return Err(DecodeError::InvalidPath("fewer than two tokens".into())),
        };

        let recipient = match args.recipient {
            r if uses_sentinels && r == msg_sender() => tx.from,
            r if uses_sentinels && r == address_this() => router,
            r => r,
        };

        Ok(DecodedSwap {
            tx_hash: tx.hash,
            dex,
            router,
            token_in,
            token_out,
            amount_in: args.amount_in,
            amount_out_min: args.amount_out_min,
            recipient,
            path,
            fees: args.fees,
            exact_output: args.exact_output,
        })
    }

    fn decode_calldata(
        &self,
        info: RouterInfo,
        calldata: &[u8],
        value: U256,
        depth: usize,
    ) -> Result<(DexKind, SwapArgs), DecodeError> {
        let selector = selector(calldata)?;
        match info.family {
            RouterFamily::V2Router => {
                let method = V2SwapMethod::from_selector(selector)
                    .filter(|m| {
                        !matches!(m, V2SwapMethod::Router02ExactIn | V2SwapMethod::Router02ExactOut)
                    })
                    .ok_or(DecodeError::UnsupportedSelector(selector))?;
                Ok((info.dex, method.decode(calldata, value)?))
            }
            RouterFamily::V3SwapRouter | RouterFamily::V3SwapRouter02 => {
                let dialect = if info.family == RouterFamily::V3SwapRouter {
                    V3Dialect::SwapRouter
                } else {
                    V3Dialect::SwapRouter02
                };
                if let Some(method) = V3SwapMethod::from_selector(dialect, selector) {
                    return Ok((info.dex, method.decode(dialect, calldata)?));
                }
                if dialect == V3Dialect::SwapRouter02 {
                    if let Some(method) = V2SwapMethod::from_selector(selector).filter(|m| {
                        matches!(m, V2SwapMethod::Router02ExactIn | V2SwapMethod::Router02ExactOut)
                    }) {
                        let dex = info.dex.v2_counterpart().unwrap_or(info.dex);
                        return Ok((dex, method.decode(calldata, value)?));
                    }
                }
                self.decode_multicall(info, calldata, value, depth)
            }
            RouterFamily::UniversalRouter => {
                let commands =
                    decode_execute(calldata).ok_or(DecodeError::UnsupportedSelector(selector))??;
                self.decode_commands(&commands, value)
            }
        }
    }

    /// First swap found among the inner calls
    fn decode_multicall(
        &self,
        info: RouterInfo,
        calldata: &[u8],
        value: U256,
        depth: usize,
    ) -> Result<(DexKind, SwapArgs), DecodeError> {
        let selector = selector(calldata)?;
        let calls = decode_multicall(calldata).ok_or(DecodeError::UnsupportedSelector(selector))??;
        if depth >= MAX_MULTICALL_DEPTH {
            return Err(DecodeError::NoSwap);
        }
        calls
            .iter()
            .find_map(|call| self.decode_calldata(info, call, value, depth + 1).ok())
            .ok_or(DecodeError::NoSwap)
    }

    fn decode_commands(
        &self,
        commands: &[RouterCommand],
        value: U256,
    ) -> Result<(DexKind, SwapArgs), DecodeError> {
        let wraps_native = commands
            .iter()
            .any(|c| matches!(c, RouterCommand::WrapEth { .. }));

        let (dex, swap) = commands
            .iter()
            .find_map(|command| match command {
                RouterCommand::V2Swap(args) => Some((DexKind::UniswapV2, args)),
                RouterCommand::V3Swap(args) => Some((DexKind::UniswapV3, args)),
                _ => None,
            })
            .ok_or(DecodeError::NoSwap)?;

        let mut args = swap.clone();
        if wraps_native && args.path.first() == Some(&self.wrapped_native) {
            // Input funded by msg.value wrapped inside the router
            if args.amount_in == contract_balance() || (!args.exact_output && args.amount_in.is_zero()) {
                args.amount_in = value;
            }
        }
        if args.amount_in == contract_balance() {
            return Err(DecodeError::MissingField("amountIn"));
        }
        Ok((dex, args))
    }

    fn substitute_native(&self, token: Address) -> Address {
        if token.is_zero() || token == NATIVE_SENTINEL {
            self.wrapped_native
        } else {
            token
        }
    }
}
