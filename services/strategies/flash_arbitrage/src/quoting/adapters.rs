//! Venue quote adapters
//!
//! Four ways of pricing a hop, all read-only `eth_call`s:
//!
//! | kind        | calls                                   | precision          |
//! |-------------|-----------------------------------------|--------------------|
//! | `v2_router` | `getAmountsOut`                         | exact              |
//! | `v2_pair`   | `getPair` + `getReserves` + V2 math     | exact              |
//! | `v3_quoter` | `quoteExactInputSingle` per fee tier    | exact              |
//! | `v3_pool`   | `getPool` + `slot0` + `liquidity`       | single-tick bound  |

use async_trait::async_trait;
use dex::abi::{uniswap_v2, uniswap_v3};
use ethers::types::{Address, Bytes, U256};
use futures::future::join_all;
use network::ChainClient;
use std::sync::Arc;
use tracing::trace;
use types::{DexKind, EngineResult, Quote};

use amm::{V2PoolState, V3Math, V3PoolState};

use super::{select_best, DexQuoter, QuoteAggregator};
use crate::config::{QuoterKind, QuotingConfig, VenueConfig};

async fn eth_call(client: &dyn ChainClient, to: Address, data: Bytes) -> EngineResult<Bytes> {
    Ok(client.call_contract(to, data).await?)
}

fn quote(venue: DexKind, router: Address, amount_in: U256, amount_out: U256) -> Quote {
    Quote {
        dex: venue,
        router,
        amount_in,
        amount_out,
        estimated_gas: venue.default_swap_gas(),
        fee_tier: None,
    }
}

/// Router `getAmountsOut([token_in, token_out])`
pub struct V2RouterQuoter {
    client: Arc<dyn ChainClient>,
    dex: DexKind,
    router: Address,
}

impl V2RouterQuoter {
    pub fn new(client: Arc<dyn ChainClient>, dex: DexKind, router: Address) -> Self {
        Self { client, dex, router }
    }
}

#[async_trait]
impl DexQuoter for V2RouterQuoter {
    fn dex(&self) -> DexKind {
        self.dex
    }

    async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> EngineResult<Option<Quote>> {
        let data = uniswap_v2::encode_get_amounts_out(amount_in, &[token_in, token_out])?;
        let output = eth_call(self.client.as_ref(), self.router, data).await?;
        let amount_out = uniswap_v2::decode_amounts_out(&output)?;
        Ok(Some(quote(self.dex, self.router, amount_in, amount_out)))
    }
}

/// Pair reserves priced locally with the constant-product formula
pub struct V2PairQuoter {
    client: Arc<dyn ChainClient>,
    dex: DexKind,
    router: Address,
    factory: Address,
    fee_bps: u32,
}

impl V2PairQuoter {
    pub fn new(
        client: Arc<dyn ChainClient>,
        dex: DexKind,
        router: Address,
        factory: Address,
        fee_bps: u32,
    ) -> Self {
        Self {
            client,
            dex,
            router,
            factory,
            fee_bps,
        }
    }
}

#[async_trait]
impl DexQuoter for V2PairQuoter {
    fn dex(&self) -> DexKind {
        self.dex
    }

    async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> EngineResult<Option<Quote>> {
        let client = self.client.as_ref();
        let pair = uniswap_v2::decode_pair(
            &eth_call(client, self.factory, uniswap_v2::encode_get_pair(token_in, token_out)?).await?,
        )?;
        if pair.is_zero() {
            return Ok(None);
        }

        let (reserve0, reserve1) = uniswap_v2::decode_reserves(
            &eth_call(client, pair, uniswap_v2::encode_get_reserves()?).await?,
        )?;
        // token0 is the lower address
        let zero_for_one = token_in < token_out;
        let pool = V2PoolState::oriented(reserve0, reserve1, zero_for_one, self.fee_bps);
        match pool.amount_out(amount_in) {
            Ok(amount_out) => Ok(Some(quote(self.dex, self.router, amount_in, amount_out))),
            Err(e) => {
                trace!("{} pair {:?} cannot fill: {}", self.dex, pair, e);
                Ok(None)
            }
        }
    }
}

/// On-chain Quoter, best of the configured fee tiers
pub struct V3QuoterAdapter {
    client: Arc<dyn ChainClient>,
    dex: DexKind,
    router: Address,
    quoter: Address,
    fee_tiers: Vec<u32>,
}

impl V3QuoterAdapter {
    pub fn new(
        client: Arc<dyn ChainClient>,
        dex: DexKind,
        router: Address,
        quoter: Address,
        fee_tiers: Vec<u32>,
    ) -> Self {
        Self {
            client,
            dex,
            router,
            quoter,
            fee_tiers,
        }
    }

    async fn quote_tier(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> EngineResult<Quote> {
        let data = uniswap_v3::encode_quote_exact_input_single(token_in, token_out, fee, amount_in)?;
        let output = eth_call(self.client.as_ref(), self.quoter, data).await?;
        let amount_out = uniswap_v3::decode_quoted_amount(&output)?;
        Ok(Quote {
            fee_tier: Some(fee),
            ..quote(self.dex, self.router, amount_in, amount_out)
        })
    }
}

#[async_trait]
impl DexQuoter for V3QuoterAdapter {
    fn dex(&self) -> DexKind {
        self.dex
    }

    async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> EngineResult<Option<Quote>> {
        let tiers = self
            .fee_tiers
            .iter()
            .map(|fee| self.quote_tier(token_in, token_out, *fee, amount_in));
        best_tier(join_all(tiers).await)
    }
}

/// Pool state with the single-tick estimate
pub struct V3PoolQuoter {
    client: Arc<dyn ChainClient>,
    dex: DexKind,
    router: Address,
    factory: Address,
    fee_tiers: Vec<u32>,
}

impl V3PoolQuoter {
    pub fn new(
        client: Arc<dyn ChainClient>,
        dex: DexKind,
        router: Address,
        factory: Address,
        fee_tiers: Vec<u32>,
    ) -> Self {
        Self {
            client,
            dex,
            router,
            factory,
            fee_tiers,
        }
    }

    async fn quote_tier(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> EngineResult<Option<Quote>> {
        let client = self.client.as_ref();
        let pool = uniswap_v3::decode_pool(
            &eth_call(client, self.factory, uniswap_v3::encode_get_pool(token_in, token_out, fee)?)
                .await?,
        )?;
        if pool.is_zero() {
            return Ok(None);
        }

        let sqrt_price_x96 =
            uniswap_v3::decode_sqrt_price(&eth_call(client, pool, uniswap_v3::encode_slot0()?).await?)?;
        let liquidity = uniswap_v3::decode_liquidity(
            &eth_call(client, pool, uniswap_v3::encode_liquidity()?).await?,
        )?;
        let state = V3PoolState {
            sqrt_price_x96,
            liquidity,
            fee_pips: fee,
        };

        match V3Math::estimate_output_amount(amount_in, &state, token_in < token_out) {
            Ok(amount_out) => Ok(Some(Quote {
                fee_tier: Some(fee),
                ..quote(self.dex, self.router, amount_in, amount_out)
            })),
            Err(e) => {
                trace!("{} pool {:?} estimate failed: {}", self.dex, pool, e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl DexQuoter for V3PoolQuoter {
    fn dex(&self) -> DexKind {
        self.dex
    }

    async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> EngineResult<Option<Quote>> {
        let tiers = self
            .fee_tiers
            .iter()
            .map(|fee| self.quote_tier(token_in, token_out, *fee, amount_in));
        let results = join_all(tiers)
            .await
            .into_iter()
            .filter_map(Result::transpose)
            .collect();
        best_tier(results)
    }
}

/// Best successful tier; the first error only when every tier failed
fn best_tier(results: Vec<EngineResult<Quote>>) -> EngineResult<Option<Quote>> {
    let mut first_error = None;
    let mut quotes = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(quote) => quotes.push(quote),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match (quotes.is_empty(), first_error) {
        (true, Some(e)) => Err(e),
        _ => Ok(select_best(quotes)),
    }
}

fn build_quoter(venue: &VenueConfig, client: Arc<dyn ChainClient>) -> Option<Arc<dyn DexQuoter>> {
    let quoter: Arc<dyn DexQuoter> = match venue.kind {
        QuoterKind::V2Router => Arc::new(V2RouterQuoter::new(client, venue.dex, venue.router)),
        QuoterKind::V2Pair => Arc::new(V2PairQuoter::new(
            client,
            venue.dex,
            venue.router,
            venue.factory?,
            venue.fee_bps,
        )),
        QuoterKind::V3Quoter => Arc::new(V3QuoterAdapter::new(
            client,
            venue.dex,
            venue.router,
            venue.quoter?,
            venue.fee_tiers.clone(),
        )),
        QuoterKind::V3Pool => Arc::new(V3PoolQuoter::new(
            client,
            venue.dex,
            venue.router,
            venue.factory?,
            venue.fee_tiers.clone(),
        )),
    };
    Some(quoter)
}

/// Aggregator over every configured venue, in configuration order
pub fn build_quoters(config: &QuotingConfig, client: Arc<dyn ChainClient>) -> QuoteAggregator {
    let mut aggregator = QuoteAggregator::new(
        config.max_concurrent_quotes,
        std::time::Duration::from_millis(config.quote_timeout_ms),
    );
    for venue in &config.venues {
        match build_quoter(venue, client.clone()) {
            Some(quoter) => aggregator.register(quoter),
            None => tracing::warn!("Skipping {} venue: incomplete {:?} config", venue.dex, venue.kind),
        }
    }
    aggregator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quoting::QuoteSource;
    use crate::test_support::MockChain;
    use ethers::abi::{encode, Token};
    use hex_literal::hex;

    const FACTORY: Address = ethers::types::H160(hex!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"));
    const ROUTER: Address = ethers::types::H160(hex!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"));

    fn tokens() -> (Address, Address) {
        (Address::repeat_byte(0x11), Address::repeat_byte(0x22))
    }

    #[tokio::test]
    async fn test_router_quote() {
        let chain = Arc::new(MockChain::new());
        let (a, b) = tokens();
        let amount = U256::exp10(18);
        chain.respond(
            ROUTER,
            uniswap_v2::encode_get_amounts_out(amount, &[a, b]).unwrap(),
            encode(&[Token::Array(vec![Token::Uint(amount), Token::Uint(U256::from(1_800u64))])]),
        );

        let quoter = V2RouterQuoter::new(chain, DexKind::UniswapV2, ROUTER);
        let quote = quoter.quote(a, b, amount).await.unwrap().unwrap();
        assert_eq!(quote.amount_out, U256::from(1_800u64));
        assert_eq!(quote.router, ROUTER);
        assert_eq!(quote.estimated_gas, DexKind::UniswapV2.default_swap_gas());
    }

    #[tokio::test]
    async fn test_pair_quote_orients_reserves() {
        let chain = Arc::new(MockChain::new());
        let (a, b) = tokens();
        let pair = Address::repeat_byte(0x99);
        chain.respond(
            FACTORY,
            uniswap_v2::encode_get_pair(a, b).unwrap(),
            encode(&[Token::Address(pair)]),
        );
        chain.respond(
            FACTORY,
            uniswap_v2::encode_get_pair(b, a).unwrap(),
            encode(&[Token::Address(pair)]),
        );
        chain.respond(
            pair,
            uniswap_v2::encode_get_reserves().unwrap(),
            encode(&[
                Token::Uint(U256::from(1_000_000u64)),
                Token::Uint(U256::from(2_000_000u64)),
                Token::Uint(U256::zero()),
            ]),
        );

        let quoter = V2PairQuoter::new(chain, DexKind::UniswapV2, ROUTER, FACTORY, 30);
        let forward = quoter.quote(a, b, U256::from(1_000u64)).await.unwrap().unwrap();
        let backward = quoter.quote(b, a, U256::from(1_000u64)).await.unwrap().unwrap();
        // 1000·9970·2e6 / (1e6·10000 + 1000·9970)
        assert_eq!(forward.amount_out, U256::from(1_992u64));
        assert_eq!(backward.amount_out, U256::from(498u64));
    }

    #[tokio::test]
    async fn test_missing_pair_is_no_market() {
        let chain = Arc::new(MockChain::new());
        let (a, b) = tokens();
        chain.respond(
            FACTORY,
            uniswap_v2::encode_get_pair(a, b).unwrap(),
            encode(&[Token::Address(Address::zero())]),
        );
        let quoter = V2PairQuoter::new(chain.clone(), DexKind::UniswapV2, ROUTER, FACTORY, 30);
        assert!(quoter.quote(a, b, U256::from(1_000u64)).await.unwrap().is_none());
        assert_eq!(chain.contract_calls(), 1);
    }

    #[tokio::test]
    async fn test_v3_quoter_picks_best_tier() {
        let chain = Arc::new(MockChain::new());
        let (a, b) = tokens();
        let quoter_address = Address::repeat_byte(0x77);
        let amount = U256::from(5_000u64);
        chain.respond(
            quoter_address,
            uniswap_v3::encode_quote_exact_input_single(a, b, 500, amount).unwrap(),
            encode(&[Token::Uint(U256::from(4_900u64))]),
        );
        chain.respond(
            quoter_address,
            uniswap_v3::encode_quote_exact_input_single(a, b, 3000, amount).unwrap(),
            encode(&[Token::Uint(U256::from(4_950u64))]),
        );
        // 10000 tier reverts

        let quoter = V3QuoterAdapter::new(
            chain,
            DexKind::UniswapV3,
            ROUTER,
            quoter_address,
            vec![500, 3000, 10000],
        );
        let quote = quoter.quote(a, b, amount).await.unwrap().unwrap();
        assert_eq!(quote.amount_out, U256::from(4_950u64));
        assert_eq!(quote.fee_tier, Some(3000));
    }

    #[tokio::test]
    async fn test_v3_quoter_all_tiers_reverting_is_error() {
        let chain = Arc::new(MockChain::new());
        let (a, b) = tokens();
        let quoter = V3QuoterAdapter::new(
            chain,
            DexKind::UniswapV3,
            ROUTER,
            Address::repeat_byte(0x77),
            vec![500],
        );
        assert!(quoter.quote(a, b, U256::from(10u64)).await.is_err());
    }

    #[tokio::test]
    async fn test_build_quoters_skips_incomplete_venues() {
        let chain = Arc::new(MockChain::new());
        let mut config = QuotingConfig::default();
        let registered = config.venues.len();
        config.venues.push(VenueConfig {
            dex: DexKind::SushiswapV2,
            kind: QuoterKind::V2Pair,
            router: ROUTER,
            factory: None,
            quoter: None,
            fee_tiers: Vec::new(),
            fee_bps: 30,
        });
        let aggregator = build_quoters(&config, chain);
        assert_eq!(aggregator.len(), registered);

        // Every default venue reverts on the mock chain
        let (a, b) = tokens();
        assert!(aggregator.best_quote(a, b, U256::from(10u64)).await.is_none());
    }
}
