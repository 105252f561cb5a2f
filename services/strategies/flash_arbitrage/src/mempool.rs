//! # Mempool Watcher - Pending Swap Intake
//!
//! ## Purpose
//!
//! Turns a pending-transaction subscription into a stream of decoded swaps.
//! Notifications carry either a transaction hash (standard
//! `newPendingTransactions`) or a full transaction object (node extension);
//! hashes are resolved with `eth_getTransactionByHash`.
//!
//! ## Flow
//!
//! ```text
//! subscription → [SeenCache] → fetch body → [MempoolDecoder] → PendingSwap channel
//!                 dedup, bounded   semaphore-bounded   router registry
//! ```
//!
//! Duplicates are dropped before any RPC round trip. The cache keeps the most
//! recent `capacity` hashes and evicts the oldest first.

use ethers::types::{Bytes, Transaction, H256};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use types::DecodedSwap;

use dex::MempoolDecoder;
use network::ChainClient;

use crate::events::{EngineEvent, EventSink};
use crate::log_search;

/// A decoded pending swap with the raw signed transaction for back-running
#[derive(Debug, Clone)]
pub struct PendingSwap {
    pub decoded: DecodedSwap,
    pub raw: Bytes,
}

/// Bounded set of recently seen hashes
pub struct SeenCache {
    capacity: usize,
    inner: Mutex<SeenInner>,
}

#[derive(Default)]
struct SeenInner {
    set: HashSet<H256>,
    order: VecDeque<H256>,
}

impl SeenCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(SeenInner::default()),
        }
    }

    /// `true` the first time a hash is offered
    pub fn insert(&self, hash: H256) -> bool {
        let mut inner = self.inner.lock();
        if !inner.set.insert(hash) {
            return false;
        }
        inner.order.push_back(hash);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.set.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.inner.lock().set.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct MempoolWatcher {
    chain: Arc<dyn ChainClient>,
    decoder: MempoolDecoder,
    seen: SeenCache,
    permits: Arc<Semaphore>,
    events: Arc<dyn EventSink>,
}

impl MempoolWatcher {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        decoder: MempoolDecoder,
        dedup_capacity: usize,
        max_concurrent_fetches: usize,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            chain,
            decoder,
            seen: SeenCache::new(dedup_capacity),
            permits: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
            events,
        }
    }

    pub fn seen(&self) -> &SeenCache {
        &self.seen
    }

    /// Decode one subscription notification; `None` for duplicates, unknown
    /// hashes, non-swap transactions and malformed payloads
    pub async fn handle_notification(&self, notification: Value) -> Option<PendingSwap> {
        let tx = match notification {
            Value::String(hash) => {
                let hash: H256 = hash.parse().ok()?;
                if !self.seen.insert(hash) {
                    return None;
                }
                match self.chain.transaction_by_hash(hash).await {
                    Ok(Some(tx)) => tx,
                    Ok(None) => {
                        trace!("Pending tx {:?} already gone", hash);
                        return None;
                    }
                    Err(e) => {
                        debug!("Fetching pending tx {:?} failed: {}", hash, e);
                        return None;
                    }
                }
            }
            body @ Value::Object(_) => {
                let tx: Transaction = serde_json::from_value(body).ok()?;
                if !self.seen.insert(tx.hash) {
                    return None;
                }
                tx
            }
            _ => return None,
        };

        let decoded = self.decoder.decode(&tx)?;
        log_search!(
            "Pending {} swap {:?}: {:?} -> {:?} ({} hops)",
            decoded.dex,
            decoded.tx_hash,
            decoded.token_in,
            decoded.token_out,
            decoded.hop_count()
        );
        self.events.record(EngineEvent::SwapDecoded {
            tx_hash: decoded.tx_hash,
            dex: decoded.dex,
            token_in: decoded.token_in,
            token_out: decoded.token_out,
        });
        Some(PendingSwap {
            decoded,
            raw: tx.rlp(),
        })
    }

    /// Consume notifications until the subscription closes, decoding up to
    /// `max_concurrent_fetches` at once. Full output channels drop swaps.
    pub fn spawn(
        self: Arc<Self>,
        mut notifications: mpsc::Receiver<Value>,
        out: mpsc::Sender<PendingSwap>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(notification) = notifications.recv().await {
                if out.is_closed() {
                    break;
                }
                let Ok(permit) = self.permits.clone().acquire_owned().await else {
                    break;
                };
                let watcher = Arc::clone(&self);
                let out = out.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Some(swap) = watcher.handle_notification(notification).await {
                        if let Err(e) = out.try_send(swap) {
                            debug!("Dropping pending swap: {}", e);
                        }
                    }
                });
            }
            debug!("Mempool subscription closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelEventSink;
    use crate::test_support::MockChain;
    use dex::abi::uniswap_v2::encode_swap_exact_tokens_for_tokens;
    use dex::registry::{RouterRegistry, UNISWAP_V2_ROUTER, WETH};
    use ethers::types::{Address, U256};
    use serde_json::json;

    fn swap_tx(hash_byte: u8) -> Transaction {
        let usdc = Address::repeat_byte(0x22);
        let calldata = encode_swap_exact_tokens_for_tokens(
            U256::from(1_000u64),
            U256::from(990u64),
            &[usdc, WETH],
            Address::repeat_byte(0x99),
            U256::from(1_700_000_000u64),
        )
        .unwrap();
        Transaction {
            hash: H256::repeat_byte(hash_byte),
            from: Address::repeat_byte(0x99),
            to: Some(UNISWAP_V2_ROUTER),
            input: calldata,
            ..Default::default()
        }
    }

    fn watcher(chain: Arc<MockChain>) -> (Arc<MempoolWatcher>, mpsc::Receiver<EngineEvent>) {
        let (sink, events) = ChannelEventSink::new(16);
        let watcher = MempoolWatcher::new(
            chain,
            MempoolDecoder::new(RouterRegistry::mainnet(), WETH),
            2,
            4,
            Arc::new(sink),
        );
        (Arc::new(watcher), events)
    }

    #[test]
    fn test_seen_cache_evicts_oldest() {
        let cache = SeenCache::new(2);
        assert!(cache.insert(H256::repeat_byte(1)));
        assert!(!cache.insert(H256::repeat_byte(1)));
        assert!(cache.insert(H256::repeat_byte(2)));
        assert!(cache.insert(H256::repeat_byte(3)));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&H256::repeat_byte(1)));
        assert!(cache.insert(H256::repeat_byte(1)));
    }

    #[tokio::test]
    async fn test_hash_notification_is_fetched_once() {
        let chain = Arc::new(MockChain::new());
        chain.add_transaction(swap_tx(0x01));
        let (watcher, mut events) = watcher(chain.clone());
        let hash = json!(format!("{:?}", H256::repeat_byte(0x01)));

        let swap = watcher.handle_notification(hash.clone()).await.unwrap();
        assert_eq!(swap.decoded.token_out, WETH);
        assert_eq!(swap.decoded.amount_in, U256::from(1_000u64));
        assert_eq!(swap.raw, swap_tx(0x01).rlp());

        assert!(watcher.handle_notification(hash).await.is_none());
        assert_eq!(chain.transaction_lookups(), 1);
        assert_eq!(events.try_recv().unwrap().name(), "swap_decoded");
    }

    #[tokio::test]
    async fn test_body_notification_skips_lookup() {
        let chain = Arc::new(MockChain::new());
        let (watcher, _events) = watcher(chain.clone());
        let body = serde_json::to_value(swap_tx(0x02)).unwrap();

        assert!(watcher.handle_notification(body).await.is_some());
        assert_eq!(chain.transaction_lookups(), 0);
    }

    #[tokio::test]
    async fn test_irrelevant_notifications() {
        let chain = Arc::new(MockChain::new());
        let mut transfer = swap_tx(0x03);
        transfer.to = Some(Address::repeat_byte(0x42));
        chain.add_transaction(transfer);
        let (watcher, _events) = watcher(chain);

        for notification in [
            json!(format!("{:?}", H256::repeat_byte(0x03))),
            json!(format!("{:?}", H256::repeat_byte(0x04))),
            json!("not-a-hash"),
            json!(42),
        ] {
            assert!(watcher.handle_notification(notification).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_spawned_watcher_forwards_swaps() {
        let chain = Arc::new(MockChain::new());
        chain.add_transaction(swap_tx(0x05));
        let (watcher, _events) = watcher(chain);
        let (notify_tx, notify_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let handle = watcher.spawn(notify_rx, out_tx);

        notify_tx
            .send(json!(format!("{:?}", H256::repeat_byte(0x05))))
            .await
            .unwrap();
        let swap = out_rx.recv().await.unwrap();
        assert_eq!(swap.decoded.tx_hash, H256::repeat_byte(0x05));

        drop(notify_tx);
        handle.await.unwrap();
    }
}
