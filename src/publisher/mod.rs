//! Publisher module for snapshot distribution
//!
//! Book and tape mutations become visible to the rest of the system only
//! through the snapshots published here, at a fixed cadence chosen by the
//! session rather than by the feed's arrival rate.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

use crate::orderbook::{PriceLevel, Trade};

/// Immutable copy of book and tape state handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    /// Publication time, epoch milliseconds
    pub timestamp: i64,
    /// Bid levels, unordered
    pub bids: Vec<PriceLevel>,
    /// Ask levels, unordered
    pub asks: Vec<PriceLevel>,
    /// Recent trades, newest first
    pub trades: Vec<Trade>,
    /// True only while both streams are open
    pub connected: bool,
    /// Terminal, user-visible failure
    pub error: Option<String>,
    /// Produced by the synthetic feed
    pub mock: bool,
}

impl Snapshot {
    /// State before the first publication
    pub fn empty(symbol: &str, mock: bool) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            bids: Vec::new(),
            asks: Vec::new(),
            trades: Vec::new(),
            connected: mock,
            error: None,
            mock,
        }
    }
}

/// Latest-value channel of snapshots
///
/// Receivers hold an `Arc`, so a snapshot can be kept across renders while
/// newer ones are published.
pub struct SnapshotPublisher {
    tx: watch::Sender<Arc<Snapshot>>,
    published: u64,
}

impl SnapshotPublisher {
    /// Create a new publisher seeded with `initial`
    pub fn new(initial: Snapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx, published: 0 }
    }

    /// Replace the current snapshot; never fails, even with no receivers
    pub fn publish(&mut self, snapshot: Snapshot) {
        self.published += 1;
        trace!(
            symbol = %snapshot.symbol,
            bids = snapshot.bids.len(),
            asks = snapshot.asks.len(),
            trades = snapshot.trades.len(),
            connected = snapshot.connected,
            "Published snapshot"
        );
        self.tx.send_replace(Arc::new(snapshot));
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    /// Number of snapshots published so far
    pub fn published(&self) -> u64 {
        self.published
    }
}
