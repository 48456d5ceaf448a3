//! Synchronous session state
//!
//! Every mutation of the book, tape and connection state happens here, one
//! event at a time, on the session task. Nothing here awaits.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::{FeedSource, SessionEvent};
use crate::config::Config;
use crate::error::FeedError;
use crate::metrics::FeedMetrics;
use crate::mock::SyntheticEvent;
use crate::orderbook::{OrderBook, Trade, TradeTape};
use crate::parser::{DepthDiff, FeedMessage, StreamKind};
use crate::publisher::Snapshot;
use crate::websocket::{ConnectionTracker, ReconnectDecision, StreamEvent, StreamSignal};

/// A reconnect the session task must schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconnect {
    pub kind: StreamKind,
    pub delay: Duration,
}

pub struct SessionCore {
    symbol: String,
    source: FeedSource,
    book: OrderBook,
    tape: TradeTape,
    tracker: ConnectionTracker,
    /// Current connect attempt per stream; signals from older attempts are stale
    depth_attempt: u64,
    trade_attempt: u64,
    /// Cleared on stop; no event mutates state afterwards
    live: bool,
    metrics: Arc<FeedMetrics>,
}

impl SessionCore {
    pub fn new(config: &Config, source: FeedSource, metrics: Arc<FeedMetrics>) -> Self {
        Self {
            symbol: config.symbol.clone(),
            source,
            book: OrderBook::new(),
            tape: TradeTape::new(config.trade_capacity),
            tracker: ConnectionTracker::new(
                config.max_reconnect_attempts,
                config.reconnect_delay(),
            ),
            depth_attempt: 0,
            trade_attempt: 0,
            live: true,
            metrics,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn tape(&self) -> &TradeTape {
        &self.tape
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn current_attempt(&self, kind: StreamKind) -> u64 {
        match kind {
            StreamKind::Depth => self.depth_attempt,
            StreamKind::Trade => self.trade_attempt,
        }
    }

    /// Open a new connect attempt for `kind`, superseding any earlier one
    ///
    /// Returns `None` once the session is stopped or the stream gave up.
    pub fn begin_attempt(&mut self, kind: StreamKind) -> Option<u64> {
        if !self.live || !self.tracker.begin_connect(kind) {
            return None;
        }
        let attempt = match kind {
            StreamKind::Depth => &mut self.depth_attempt,
            StreamKind::Trade => &mut self.trade_attempt,
        };
        *attempt += 1;
        Some(*attempt)
    }

    /// Apply one event; returns a reconnect to schedule, if any
    pub fn handle(&mut self, event: SessionEvent) -> Option<Reconnect> {
        if !self.live {
            trace!("Dropping event delivered after session stop");
            return None;
        }

        match event {
            SessionEvent::Stream(event) => self.handle_stream(event),
            SessionEvent::Synthetic(event) => {
                self.handle_synthetic(event);
                None
            }
        }
    }

    fn handle_stream(&mut self, event: StreamEvent) -> Option<Reconnect> {
        let StreamEvent {
            kind,
            attempt,
            signal,
        } = event;

        if attempt != self.current_attempt(kind) {
            debug!(stream = %kind, attempt, current = self.current_attempt(kind), "Ignoring stale stream event");
            return None;
        }

        match signal {
            StreamSignal::Opened => {
                self.tracker.on_open(kind);
                self.metrics.set_connected(self.tracker.connected());
                info!(stream = %kind, connected = self.tracker.connected(), "Stream connected");
                None
            }
            StreamSignal::Frame(text) => {
                self.apply_frame(kind, &text);
                None
            }
            StreamSignal::Closed(reason) => {
                let decision = self.tracker.on_failure(kind);
                self.metrics.set_connected(false);
                match decision {
                    ReconnectDecision::Retry(delay) => {
                        warn!(
                            stream = %kind,
                            reason = %reason,
                            failures = self.tracker.failures(),
                            delay_ms = delay.as_millis() as u64,
                            "Stream disconnected, scheduling reconnect"
                        );
                        self.metrics.record_reconnect(kind);
                        Some(Reconnect { kind, delay })
                    }
                    ReconnectDecision::GiveUp => {
                        error!(
                            stream = %kind,
                            reason = %reason,
                            failures = self.tracker.failures(),
                            error = %FeedError::MaxReconnectAttemptsExceeded,
                            "Too many connection failures, stopping reconnection attempts"
                        );
                        None
                    }
                }
            }
        }
    }

    fn handle_synthetic(&mut self, event: SyntheticEvent) {
        match event {
            SyntheticEvent::Ready => {
                for kind in StreamKind::ALL {
                    self.tracker.begin_connect(kind);
                    self.tracker.on_open(kind);
                }
                self.metrics.set_connected(self.tracker.connected());
            }
            SyntheticEvent::Depth(diff) => self.apply_depth(&diff),
            SyntheticEvent::Trade(trade) => self.apply_trade(trade),
        }
    }

    /// Parse and apply one frame; malformed frames are logged and dropped
    fn apply_frame(&mut self, kind: StreamKind, raw: &str) {
        match FeedMessage::parse(kind, raw) {
            Ok(FeedMessage::Depth(diff)) => self.apply_depth(&diff),
            Ok(FeedMessage::Trade(event)) => self.apply_trade(Trade::from(&event)),
            Ok(FeedMessage::Ignored(event)) => {
                trace!(stream = %kind, event = %event, "Ignoring message");
            }
            Err(e) => {
                warn!(stream = %kind, error = %e, "Dropping malformed message");
                self.metrics.record_malformed(kind);
            }
        }
    }

    fn apply_depth(&mut self, diff: &DepthDiff) {
        let changes = self.book.apply_diff(diff);
        self.metrics.depth_updates.inc();
        trace!(changes, "Applied depth diff");
    }

    fn apply_trade(&mut self, trade: Trade) {
        let id = trade.id;
        if self.tape.push(trade) {
            self.metrics.trades.inc();
        } else {
            debug!(trade_id = id, "Duplicate trade dropped");
        }
    }

    /// Copy current state into an immutable snapshot
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            symbol: self.symbol.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            bids: self.book.bids(),
            asks: self.book.asks(),
            trades: self.tape.to_vec(),
            connected: self.tracker.connected(),
            error: self.tracker.error().map(str::to_string),
            mock: self.source == FeedSource::Mock,
        }
    }

    /// End the session: discard state and refuse every later event
    pub fn stop(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.book.clear();
        self.tape.clear();
        self.tracker.reset();
        self.metrics.set_connected(false);
    }
}
