//! # Bundle Orchestrator - Atomic Call Sequences
//!
//! ## Purpose
//!
//! Turns a profitable [`Route`] (or a pending [`DecodedSwap`] to mirror) into
//! the ordered call list the flash-loan executor runs atomically:
//!
//! ```text
//! [approve?] pre-substitution   loan token → base      (only when they differ)
//! [approve?] swap × hops        base → … → base
//! [approve?] post-substitution  base → loan token
//!            tip                value transfer to the builder
//! ```
//!
//! ## Invariants
//!
//! - One approval per distinct `(token, spender)`, placed immediately before
//!   the first call that spends it; amounts for repeated spends are summed
//! - `calls.len() == approvals + swaps + 1`, plus 2 with substitution
//! - Nothing partial is returned: any missing router, unencodable venue or
//!   inconsistent substitution fails the whole build with a construction error

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use types::{
    Bundle, Call, CallKind, DecodedSwap, DexKind, EngineError, EngineResult, FlashLoanRequest, Hop,
    Route,
};

use dex::abi::erc20::encode_approve;
use dex::{encoder_for, EncodeContext};

const BPS: u64 = 10_000;

/// How much native value is paid to the block builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TipPolicy {
    /// Constant tip in wei
    Fixed { amount: U256 },
    /// Share of expected profit in basis points
    ProfitShare { bps: u32 },
}

impl TipPolicy {
    /// Tip in wei for a profit expressed in wei
    pub fn tip_for(&self, profit: U256) -> U256 {
        match *self {
            TipPolicy::Fixed { amount } => amount,
            TipPolicy::ProfitShare { bps } => {
                let bps = U256::from(u64::from(bps).min(BPS));
                match profit.checked_mul(bps) {
                    Some(scaled) => scaled / U256::from(BPS),
                    None => profit / U256::from(BPS) * bps,
                }
            }
        }
    }
}

/// Conversion swaps between the flash-loaned token and the traded token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// loan token → first traded token
    pub pre: Hop,
    /// last traded token → loan token
    pub post: Hop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashLoanSpec {
    pub provider: Address,
    pub token: Address,
    pub amount: U256,
    pub substitution: Option<Substitution>,
}

impl FlashLoanSpec {
    /// Borrow exactly what a route consumes, in its base token
    pub fn for_route(provider: Address, route: &Route) -> Self {
        Self {
            provider,
            token: route.base_token,
            amount: route.amount_in(),
            substitution: None,
        }
    }
}

/// What the bundle trades
#[derive(Debug, Clone, Copy)]
pub enum BundleSource<'a> {
    Route(&'a Route),
    /// Same path as a pending swap, in one router call on its venue
    Swap(&'a DecodedSwap),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Flash-loan executor; receives every swap output
    pub executor: Address,
    pub builder_payment: Address,
    pub tip: TipPolicy,
    pub slippage_bps: u32,
    pub deadline_secs: u64,
    /// Router used when a venue is traded without a quoted hop
    pub routers: HashMap<DexKind, Address>,
}

pub struct BundleOrchestrator {
    config: OrchestratorConfig,
}

impl BundleOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Assemble the executor call list for `source` funded by `loan`.
    ///
    /// `tip_basis` is the expected profit in wei that profit-share tips are
    /// taken from.
    pub fn build_bundle(
        &self,
        source: BundleSource<'_>,
        loan: &FlashLoanSpec,
        tip_basis: U256,
        now_secs: u64,
    ) -> EngineResult<Bundle> {
        if self.config.executor.is_zero() {
            return Err(EngineError::construction("executor contract is not configured"));
        }
        if loan.amount.is_zero() {
            return Err(EngineError::construction("flash loan amount is zero"));
        }

        let ctx = EncodeContext {
            recipient: self.config.executor,
            deadline: U256::from(now_secs.saturating_add(self.config.deadline_secs)),
            slippage_bps: self.config.slippage_bps,
        };

        let (start, end) = match source {
            BundleSource::Route(route) => (route.base_token, route.base_token),
            BundleSource::Swap(swap) => (swap.token_in, swap.token_out),
        };
        let traded_amount = self.check_funding(source, loan, start, end)?;

        let mut spends = Vec::new();
        if let Some(sub) = &loan.substitution {
            spends.push(self.hop_step(&sub.pre, CallKind::Substitution, &ctx)?);
        }
        match source {
            BundleSource::Route(route) => {
                for hop in &route.hops {
                    spends.push(self.hop_step(hop, CallKind::Swap, &ctx)?);
                }
            }
            BundleSource::Swap(swap) => spends.push(self.mirror_step(swap, traded_amount, &ctx)?),
        }
        if let Some(sub) = &loan.substitution {
            spends.push(self.hop_step(&sub.post, CallKind::Substitution, &ctx)?);
        }

        let mut calls = with_approvals(spends)?;
        calls.push(self.tip_call(tip_basis));

        let expected_profit = match source {
            BundleSource::Route(route) => route.net_profit,
            BundleSource::Swap(_) => U256::zero(),
        };
        let bundle = Bundle {
            flashloan: FlashLoanRequest {
                provider: loan.provider,
                token: loan.token,
                amount: loan.amount,
            },
            calls,
            base_token: start,
            expected_profit,
        };
        debug!(
            "Built bundle: {} calls ({} approvals, {} swaps, {} substitutions)",
            bundle.calls.len(),
            bundle.count(CallKind::Approval),
            bundle.count(CallKind::Swap),
            bundle.count(CallKind::Substitution)
        );
        Ok(bundle)
    }

    /// Check the loan actually funds the trade and gets repaid in its own
    /// token; returns the amount entering the traded path
    fn check_funding(
        &self,
        source: BundleSource<'_>,
        loan: &FlashLoanSpec,
        start: Address,
        end: Address,
    ) -> EngineResult<U256> {
        let required = match source {
            BundleSource::Route(route) => route.amount_in(),
            BundleSource::Swap(_) => U256::zero(),
        };

        let available = match &loan.substitution {
            None => {
                if loan.token != start || end != start {
                    return Err(EngineError::construction(format!(
                        "loan token {:?} differs from traded tokens {:?}/{:?} without a substitution",
                        loan.token, start, end
                    )));
                }
                loan.amount
            }
            Some(sub) => {
                if loan.token == start && end == start {
                    return Err(EngineError::construction(
                        "substitution given although the loan token is already traded",
                    ));
                }
                if sub.pre.token_in != loan.token || sub.pre.token_out != start {
                    return Err(EngineError::construction(format!(
                        "pre-substitution {:?}->{:?} does not convert the loan into {:?}",
                        sub.pre.token_in, sub.pre.token_out, start
                    )));
                }
                if sub.post.token_in != end || sub.post.token_out != loan.token {
                    return Err(EngineError::construction(format!(
                        "post-substitution {:?}->{:?} does not repay in {:?}",
                        sub.post.token_in, sub.post.token_out, loan.token
                    )));
                }
                if sub.pre.amount_in > loan.amount {
                    return Err(EngineError::construction(
                        "pre-substitution spends more than the loan",
                    ));
                }
                sub.pre.amount_out
            }
        };

        if available < required {
            return Err(EngineError::construction(format!(
                "loan provides {} but the route needs {}",
                available, required
            )));
        }
        Ok(available)
    }

    fn hop_step(&self, hop: &Hop, kind: CallKind, ctx: &EncodeContext) -> EngineResult<Call> {
        if hop.router.is_zero() {
            return Err(EngineError::construction(format!("{} hop has no router", hop.dex)));
        }
        let encoder = encoder_for(hop.dex).ok_or_else(|| {
            EngineError::construction(format!("no swap encoder for {}", hop.dex))
        })?;
        let calldata = encoder.encode_swap(hop, ctx)?;
        Ok(Call::new(kind, hop.router, calldata).spending(hop.token_in, hop.amount_in))
    }

    fn mirror_step(
        &self,
        swap: &DecodedSwap,
        amount_in: U256,
        ctx: &EncodeContext,
    ) -> EngineResult<Call> {
        if swap.path.len() < 2 || swap.amount_in.is_zero() {
            return Err(EngineError::construction("pending swap has no tradable path"));
        }
        let router = *self
            .config
            .routers
            .get(&swap.dex)
            .ok_or_else(|| EngineError::construction(format!("no router configured for {}", swap.dex)))?;
        let encoder = encoder_for(swap.dex)
            .ok_or_else(|| EngineError::construction(format!("no swap encoder for {}", swap.dex)))?;

        // Victim's minimum scaled to our size
        let amount_out_min = swap
            .amount_out_min
            .checked_mul(amount_in)
            .map(|scaled| scaled / swap.amount_in)
            .ok_or_else(|| EngineError::construction("minimum output overflows"))?;
        let calldata =
            encoder.encode_path_swap(&swap.path, &swap.fees, amount_in, amount_out_min, ctx)?;
        Ok(Call::new(CallKind::Swap, router, calldata).spending(swap.token_in, amount_in))
    }

    fn tip_call(&self, tip_basis: U256) -> Call {
        Call::new(CallKind::Tip, self.config.builder_payment, Default::default())
            .with_value(self.config.tip.tip_for(tip_basis))
    }
}

/// Insert one approval per (token, spender) ahead of its first spender
fn with_approvals(spends: Vec<Call>) -> EngineResult<Vec<Call>> {
    let mut totals: HashMap<(Address, Address), U256> = HashMap::new();
    for call in &spends {
        if let (true, Some(token)) = (call.requires_approval, call.approval_token) {
            let total = totals.entry((token, call.target)).or_default();
            *total = total.saturating_add(call.approval_amount);
        }
    }

    let mut calls = Vec::with_capacity(spends.len() * 2 + 1);
    for call in spends {
        if let (true, Some(token)) = (call.requires_approval, call.approval_token) {
            if let Some(amount) = totals.remove(&(token, call.target)) {
                let calldata = encode_approve(call.target, amount)?;
                calls.push(Call::new(CallKind::Approval, token, calldata));
            }
        }
        calls.push(call);
    }
    Ok(calls)
}
