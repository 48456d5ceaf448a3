//! Prometheus metrics for the feed pipeline
//!
//! Registered on an owned registry so independent sessions (and tests) never
//! collide on metric names.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::error::{FeedError, Result};
use crate::parser::StreamKind;

pub struct FeedMetrics {
    registry: Registry,
    pub depth_updates: IntCounter,
    pub trades: IntCounter,
    pub malformed: IntCounterVec,
    pub reconnects: IntCounterVec,
    pub connected: IntGauge,
    pub snapshots: IntCounter,
}

impl FeedMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("orderbook".to_string()), None)?;

        let depth_updates = IntCounter::new(
            "depth_updates_total",
            "Depth diff messages applied to the book",
        )?;
        let trades = IntCounter::new("trades_total", "Trades appended to the tape")?;
        let malformed = IntCounterVec::new(
            Opts::new("malformed_messages_total", "Messages dropped as unparseable"),
            &["stream"],
        )?;
        let reconnects = IntCounterVec::new(
            Opts::new("reconnects_total", "Reconnect attempts scheduled"),
            &["stream"],
        )?;
        let connected = IntGauge::new("connected", "1 while both streams are open")?;
        let snapshots = IntCounter::new("snapshots_total", "Snapshots published")?;

        registry.register(Box::new(depth_updates.clone()))?;
        registry.register(Box::new(trades.clone()))?;
        registry.register(Box::new(malformed.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(connected.clone()))?;
        registry.register(Box::new(snapshots.clone()))?;

        Ok(Self {
            registry,
            depth_updates,
            trades,
            malformed,
            reconnects,
            connected,
            snapshots,
        })
    }

    pub fn record_malformed(&self, kind: StreamKind) {
        self.malformed.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn record_reconnect(&self, kind: StreamKind) {
        self.reconnects.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(i64::from(connected));
    }

    /// Text exposition format of every registered metric
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| FeedError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_registries() {
        let first = FeedMetrics::new().unwrap();
        let second = FeedMetrics::new().unwrap();
        first.trades.inc();
        assert_eq!(first.trades.get(), 1);
        assert_eq!(second.trades.get(), 0);
    }

    #[test]
    fn test_encode_includes_labels() {
        let metrics = FeedMetrics::new().unwrap();
        metrics.record_malformed(StreamKind::Depth);
        metrics.record_reconnect(StreamKind::Trade);
        metrics.set_connected(true);

        let text = metrics.encode().unwrap();
        assert!(text.contains("orderbook_malformed_messages_total{stream=\"depth\"} 1"));
        assert!(text.contains("orderbook_reconnects_total{stream=\"trade\"} 1"));
        assert!(text.contains("orderbook_connected 1"));
    }
}
