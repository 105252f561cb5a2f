//! Token universe feed
//!
//! Periodically pulls `[{address, symbol, decimals, volume}]` over HTTP and
//! keeps the top-N tokens by volume as extra route candidates. Records with a
//! bad address, empty symbol, missing decimals or unparsable volume are
//! dropped; a failed refresh keeps the previous list.

use ethers::types::Address;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use types::{EngineError, EngineResult, TokenInfo};

use crate::log_metrics;

/// Largest decimals value accepted from the feed
const MAX_DECIMALS: u64 = 36;

fn parse_volume(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn parse_record(record: &Value) -> Option<(TokenInfo, Decimal)> {
    let address = Address::from_str(record.get("address")?.as_str()?.trim()).ok()?;
    let symbol = record.get("symbol")?.as_str()?.trim();
    if symbol.is_empty() {
        return None;
    }
    let decimals = record.get("decimals")?.as_u64().filter(|d| *d <= MAX_DECIMALS)?;
    let volume = parse_volume(record.get("volume")?)?;
    if volume.is_sign_negative() {
        return None;
    }
    Some((TokenInfo::new(address, symbol, decimals as u8), volume))
}

/// Valid records sorted by volume, highest first, truncated to `top_n`.
/// Equal volumes keep feed order; repeated addresses keep the first record.
pub fn rank_tokens(records: &[Value], top_n: usize) -> Vec<TokenInfo> {
    let mut ranked: Vec<(TokenInfo, Decimal)> = Vec::with_capacity(records.len());
    for (token, volume) in records.iter().filter_map(parse_record) {
        if ranked.iter().all(|(seen, _)| seen.address != token.address) {
            ranked.push((token, volume));
        }
    }
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(top_n).map(|(token, _)| token).collect()
}

pub struct TokenFeed {
    http: reqwest::Client,
    url: String,
    top_n: usize,
    timeout: Duration,
    tokens: RwLock<Vec<TokenInfo>>,
}

impl TokenFeed {
    pub fn new(http: reqwest::Client, url: impl Into<String>, top_n: usize, timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            top_n,
            timeout,
            tokens: RwLock::new(Vec::new()),
        }
    }

    pub async fn fetch(&self) -> EngineResult<Vec<TokenInfo>> {
        let response = self
            .http
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngineError::network(format!("token feed request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::network(format!("token feed HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| EngineError::decode(format!("token feed body: {}", e)))?;
        let records = body
            .as_array()
            .ok_or_else(|| EngineError::decode("token feed body is not an array"))?;
        Ok(rank_tokens(records, self.top_n))
    }

    /// Replace the current list; on failure the previous list stays
    pub async fn refresh(&self) -> EngineResult<usize> {
        let tokens = self.fetch().await?;
        let count = tokens.len();
        *self.tokens.write() = tokens;
        log_metrics!("Token universe refreshed: {} tokens", count);
        Ok(count)
    }

    pub fn tokens(&self) -> Vec<TokenInfo> {
        self.tokens.read().clone()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.tokens.read().iter().map(|token| token.address).collect()
    }

    pub fn spawn_refresh(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh().await {
                    warn!("Token feed refresh failed, keeping {} tokens: {}", self.tokens.read().len(), e);
                } else {
                    debug!("Next token refresh in {:?}", interval);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr(byte: u8) -> String {
        format!("{:?}", Address::repeat_byte(byte))
    }

    #[test]
    fn test_rank_sorts_filters_and_truncates() {
        let records = vec![
            json!({"address": addr(1), "symbol": "LOW", "decimals": 18, "volume": 10}),
            json!({"address": addr(2), "symbol": "HIGH", "decimals": 6, "volume": "1500.5"}),
            json!({"address": "0xnothex", "symbol": "BAD", "decimals": 18, "volume": 99999}),
            json!({"address": addr(3), "symbol": "", "decimals": 18, "volume": 99999}),
            json!({"address": addr(4), "symbol": "NODEC", "volume": 99999}),
            json!({"address": addr(5), "symbol": "MID", "decimals": 8, "volume": 200.25}),
            json!({"address": addr(6), "symbol": "NEG", "decimals": 8, "volume": -5}),
            json!({"address": addr(2), "symbol": "DUP", "decimals": 6, "volume": 1e9}),
        ];
        let ranked = rank_tokens(&records, 2);
        let symbols: Vec<&str> = ranked.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["HIGH", "MID"]);
        assert_eq!(ranked[0].decimals, 6);

        assert_eq!(rank_tokens(&records, 10).len(), 3);
    }

    #[test]
    fn test_equal_volume_keeps_feed_order() {
        let records = vec![
            json!({"address": addr(1), "symbol": "A", "decimals": 18, "volume": 5}),
            json!({"address": addr(2), "symbol": "B", "decimals": 18, "volume": 5}),
        ];
        let ranked = rank_tokens(&records, 2);
        assert_eq!(ranked[0].symbol, "A");
        assert_eq!(ranked[1].symbol, "B");
    }

    #[tokio::test]
    async fn test_refresh_from_feed() {
        let mut server = mockito::Server::new_async().await;
        let body = json!([
            {"address": addr(1), "symbol": "WETH", "decimals": 18, "volume": "900"},
            {"address": addr(2), "symbol": "USDC", "decimals": 6, "volume": "1200"}
        ]);
        let mock = server
            .mock("GET", "/tokens")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let feed = TokenFeed::new(
            reqwest::Client::new(),
            format!("{}/tokens", server.url()),
            5,
            Duration::from_secs(2),
        );
        assert_eq!(feed.refresh().await.unwrap(), 2);
        mock.assert_async().await;
        assert_eq!(feed.addresses(), vec![Address::repeat_byte(2), Address::repeat_byte(1)]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_list() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/tokens")
            .with_status(200)
            .with_body(json!([{"address": addr(1), "symbol": "WETH", "decimals": 18, "volume": 1}]).to_string())
            .expect(1)
            .create_async()
            .await;

        let feed = TokenFeed::new(
            reqwest::Client::new(),
            format!("{}/tokens", server.url()),
            5,
            Duration::from_secs(2),
        );
        feed.refresh().await.unwrap();
        ok.assert_async().await;
        ok.remove_async().await;

        server
            .mock("GET", "/tokens")
            .with_status(503)
            .create_async()
            .await;
        assert!(matches!(feed.refresh().await, Err(EngineError::Network { .. })));
        assert_eq!(feed.tokens().len(), 1);
    }
}
