//! WebSocket `eth_subscribe` streams with automatic reconnection
//!
//! Each subscription runs in its own task, rotating through the configured
//! WebSocket endpoints with the same backoff policy as the RPC supervisor.
//! Notification payloads (`params.result`) are forwarded on a bounded channel;
//! the task ends when the receiver is dropped.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionManager;
use crate::retry::{backoff_delay, with_jitter};
use crate::{NetworkError, Result};

/// Subscription topics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Pending transaction hashes
    NewPendingTransactions,
    /// Full pending transaction objects (node extension)
    NewPendingTransactionBodies,
    NewHeads,
}

impl SubscriptionKind {
    pub fn params(&self) -> Value {
        match self {
            SubscriptionKind::NewPendingTransactions => json!(["newPendingTransactions"]),
            SubscriptionKind::NewPendingTransactionBodies => {
                json!(["newPendingTransactions", true])
            }
            SubscriptionKind::NewHeads => json!(["newHeads"]),
        }
    }
}

/// One parsed WebSocket frame
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionFrame {
    /// Reply to `eth_subscribe` carrying the subscription id
    Confirmed(String),
    Notification { subscription: String, result: Value },
    Error(String),
    Other,
}

impl SubscriptionFrame {
    pub fn parse(frame: &Value) -> Self {
        if let Some(err) = frame.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return SubscriptionFrame::Error(message);
        }

        if frame.get("method").and_then(Value::as_str) == Some("eth_subscription") {
            let params = frame.get("params");
            let subscription = params
                .and_then(|p| p.get("subscription"))
                .and_then(Value::as_str);
            let result = params.and_then(|p| p.get("result"));
            return match (subscription, result) {
                (Some(subscription), Some(result)) => SubscriptionFrame::Notification {
                    subscription: subscription.to_string(),
                    result: result.clone(),
                },
                _ => SubscriptionFrame::Other,
            };
        }

        match frame.get("result").and_then(Value::as_str) {
            Some(id) if frame.get("id").is_some() => SubscriptionFrame::Confirmed(id.to_string()),
            _ => SubscriptionFrame::Other,
        }
    }
}

enum StreamEnd {
    ReceiverDropped,
    Closed,
}

impl ConnectionManager {
    /// Open a reconnecting subscription. Fails only when no WebSocket
    /// endpoint is configured.
    pub fn subscribe(self: &Arc<Self>, kind: SubscriptionKind) -> Result<mpsc::Receiver<Value>> {
        if self.config().ws_endpoints.is_empty() {
            return Err(NetworkError::configuration(
                "subscriptions require at least one WebSocket endpoint",
            ));
        }
        let (tx, rx) = mpsc::channel(self.config().subscription_buffer.max(1));
        let manager = Arc::clone(self);
        tokio::spawn(async move { run_subscription(manager, kind, tx).await });
        Ok(rx)
    }
}

async fn run_subscription(
    manager: Arc<ConnectionManager>,
    kind: SubscriptionKind,
    tx: mpsc::Sender<Value>,
) {
    let config = manager.config().clone();
    let endpoints = config.ws_endpoints;
    let mut index = 0usize;
    let mut attempt = 0u32;

    loop {
        if tx.is_closed() {
            return;
        }
        let endpoint = &endpoints[index % endpoints.len()];

        match stream_subscription(endpoint, kind, &tx, config.request_timeout, &mut attempt).await {
            Ok(StreamEnd::ReceiverDropped) => {
                debug!("{:?} subscription receiver dropped, stopping", kind);
                return;
            }
            Ok(StreamEnd::Closed) => warn!("⚠️ Subscription stream on {} closed", endpoint),
            Err(e) => warn!("⚠️ Subscription on {} failed: {}", endpoint, e),
        }

        index = (index + 1) % endpoints.len();
        attempt = attempt.saturating_add(1);
        if attempt > config.max_retries {
            error!(
                "❌ {:?} subscription has failed {} times in a row, continuing at max backoff",
                kind, attempt
            );
        }
        let delay = with_jitter(
            backoff_delay(config.base_backoff, attempt.saturating_sub(1), config.max_backoff),
            config.max_backoff,
        );
        tokio::time::sleep(delay).await;
    }
}

async fn stream_subscription(
    endpoint: &str,
    kind: SubscriptionKind,
    tx: &mpsc::Sender<Value>,
    connect_timeout: std::time::Duration,
    attempt: &mut u32,
) -> Result<StreamEnd> {
    let (mut ws, _) = timeout(connect_timeout, connect_async(endpoint))
        .await
        .map_err(|_| NetworkError::timeout("ws connect", connect_timeout))?
        .map_err(|e| NetworkError::transport(endpoint, e))?;

    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_subscribe",
        "params": kind.params(),
    });
    ws.send(Message::Text(request.to_string()))
        .await
        .map_err(|e| NetworkError::transport(endpoint, e))?;

    let mut subscription_id: Option<String> = None;
    while let Some(message) = ws.next().await {
        let message = message.map_err(|e| NetworkError::transport(endpoint, e))?;
        match message {
            Message::Text(text) => {
                let frame: Value = serde_json::from_str(&text)
                    .map_err(|e| NetworkError::protocol(format!("invalid frame: {}", e)))?;
                match SubscriptionFrame::parse(&frame) {
                    SubscriptionFrame::Confirmed(id) => {
                        info!("📡 Subscribed to {:?} on {} ({})", kind, endpoint, id);
                        subscription_id = Some(id);
                        *attempt = 0;
                    }
                    SubscriptionFrame::Notification {
                        subscription,
                        result,
                    } => {
                        if subscription_id.as_deref() != Some(subscription.as_str()) {
                            continue;
                        }
                        if tx.send(result).await.is_err() {
                            return Ok(StreamEnd::ReceiverDropped);
                        }
                    }
                    SubscriptionFrame::Error(message) => {
                        return Err(NetworkError::Rpc { code: 0, message });
                    }
                    SubscriptionFrame::Other => {}
                }
            }
            Message::Ping(payload) => {
                ws.send(Message::Pong(payload))
                    .await
                    .map_err(|e| NetworkError::transport(endpoint, e))?;
            }
            Message::Close(_) => return Ok(StreamEnd::Closed),
            _ => {}
        }
    }

    Ok(StreamEnd::Closed)
}
