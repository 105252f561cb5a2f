//! Engine event sink
//!
//! Every state transition (route found, swap decoded, pipeline stage,
//! opportunity outcome, health change) is reported through
//! [`EventSink::record`]. Recording never blocks and never fails: a full or
//! closed channel drops the event and bumps a counter.

use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::info;
use types::DexKind;

use crate::pipeline::ExecutionStage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    RouteFound {
        base_token: Address,
        hops: usize,
        net_profit: U256,
    },
    SwapDecoded {
        tx_hash: H256,
        dex: DexKind,
        token_in: Address,
        token_out: Address,
    },
    StageCompleted {
        opportunity_id: u64,
        stage: ExecutionStage,
        duration_ms: u64,
        success: bool,
    },
    OpportunityFinished {
        opportunity_id: u64,
        stage: ExecutionStage,
        net_profit: Option<U256>,
        error: Option<String>,
    },
    HealthChanged {
        status: String,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::RouteFound { .. } => "route_found",
            EngineEvent::SwapDecoded { .. } => "swap_decoded",
            EngineEvent::StageCompleted { .. } => "stage_completed",
            EngineEvent::OpportunityFinished { .. } => "opportunity_finished",
            EngineEvent::HealthChanged { .. } => "health_changed",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: EngineEvent);
}

/// Forwards events to a bounded channel consumed by an external writer
pub struct ChannelEventSink {
    tx: mpsc::Sender<EngineEvent>,
    dropped: AtomicU64,
}

impl ChannelEventSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelEventSink {
    fn record(&self, event: EngineEvent) {
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Writes events as structured log lines
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: EngineEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "engine_events", event = event.name(), "{}", json),
            Err(e) => info!(target: "engine_events", event = event.name(), "unserialisable event: {}", e),
        }
    }
}
