//! Synthetic feed used when the live endpoint is unreachable
//!
//! Emits the same typed depth and trade events the live adapter produces, so
//! snapshots built from it have the identical shape.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::orderbook::{Trade, TradeSide};
use crate::parser::{DepthDiff, PriceLevelUpdate};

const BASE_PRICE: f64 = 95_000.0;
const TICK: f64 = 10.0;
const LEVELS: usize = 20;

/// Events produced by the synthetic feed
#[derive(Debug, Clone)]
pub enum SyntheticEvent {
    /// Both simulated streams are up
    Ready,
    Depth(DepthDiff),
    Trade(Trade),
}

pub struct MockFeed {
    rng: StdRng,
    next_trade_id: u64,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic feed for tests
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            next_trade_id: 1,
        }
    }

    fn bid_price(offset: usize) -> String {
        format!("{:.2}", BASE_PRICE - offset as f64 * TICK)
    }

    fn ask_price(offset: usize) -> String {
        format!("{:.2}", BASE_PRICE + offset as f64 * TICK)
    }

    fn quantity(&mut self) -> f64 {
        self.rng.gen_range(0.1..2.1)
    }

    /// Initial book: `LEVELS` levels per side around the base price
    pub fn seed_book(&mut self) -> DepthDiff {
        let mut diff = DepthDiff::default();
        for offset in 0..LEVELS {
            let bid = PriceLevelUpdate {
                price: Self::bid_price(offset),
                quantity: self.quantity(),
            };
            let ask = PriceLevelUpdate {
                price: Self::ask_price(offset),
                quantity: self.quantity(),
            };
            diff.bids.push(bid);
            diff.asks.push(ask);
        }
        diff
    }

    /// One step: overwrite a random level on each side and print a trade
    pub fn step(&mut self, now_ms: u64) -> (DepthDiff, Trade) {
        let bid_offset = self.rng.gen_range(0..LEVELS);
        let ask_offset = self.rng.gen_range(0..LEVELS);

        let diff = DepthDiff {
            event_time: Some(now_ms),
            bids: vec![PriceLevelUpdate {
                price: Self::bid_price(bid_offset),
                quantity: self.quantity(),
            }],
            asks: vec![PriceLevelUpdate {
                price: Self::ask_price(ask_offset),
                quantity: self.quantity(),
            }],
            ..Default::default()
        };

        let side = if self.rng.gen_bool(0.5) {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };
        let trade = Trade {
            id: self.next_trade_id,
            price: BASE_PRICE + self.rng.gen_range(-50.0..50.0),
            quantity: self.rng.gen_range(0.01..0.51),
            timestamp: now_ms,
            side,
        };
        self.next_trade_id += 1;

        (diff, trade)
    }

    /// Drive the feed until the receiver goes away
    pub async fn run<E>(mut self, period: Duration, events: mpsc::Sender<E>)
    where
        E: From<SyntheticEvent> + Send + 'static,
    {
        info!(period_ms = period.as_millis() as u64, "Starting synthetic feed");

        let seed = self.seed_book();
        if events.send(E::from(SyntheticEvent::Ready)).await.is_err()
            || events.send(E::from(SyntheticEvent::Depth(seed))).await.is_err()
        {
            return;
        }

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
            let (diff, trade) = self.step(now_ms);
            debug!(trade_id = trade.id, "Synthetic tick");

            if events.send(E::from(SyntheticEvent::Depth(diff))).await.is_err()
                || events.send(E::from(SyntheticEvent::Trade(trade))).await.is_err()
            {
                return;
            }
        }
    }
}

impl Default for MockFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{OrderBook, Side};

    #[test]
    fn test_seed_book_levels() {
        let mut feed = MockFeed::seeded(7);
        let diff = feed.seed_book();
        assert_eq!(diff.bids.len(), LEVELS);
        assert_eq!(diff.asks.len(), LEVELS);
        assert_eq!(diff.bids[0].price, "95000.00");
        assert_eq!(diff.bids[19].price, "94810.00");
        assert_eq!(diff.asks[19].price, "95190.00");
        assert!(diff
            .bids
            .iter()
            .chain(diff.asks.iter())
            .all(|l| l.quantity >= 0.1 && l.quantity < 2.1));
    }

    #[test]
    fn test_steps_stay_on_seeded_grid() {
        let mut feed = MockFeed::seeded(42);
        let mut book = OrderBook::new();
        book.apply_diff(&feed.seed_book());

        for i in 0..100 {
            let (diff, trade) = feed.step(1_000 + i);
            book.apply_diff(&diff);
            assert_eq!(trade.id, i + 1);
            assert!((trade.price - BASE_PRICE).abs() <= 50.0);
            assert!(trade.quantity >= 0.01 && trade.quantity < 0.51);
        }

        assert_eq!(book.side(Side::Bid).len(), LEVELS);
        assert_eq!(book.side(Side::Ask).len(), LEVELS);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = MockFeed::seeded(3);
        let mut b = MockFeed::seeded(3);
        assert_eq!(a.seed_book().bids, b.seed_book().bids);
        assert_eq!(a.step(5).1, b.step(5).1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_receiver_dropped() {
        let (tx, mut rx) = mpsc::channel::<SyntheticEvent>(4);
        let task = tokio::spawn(MockFeed::seeded(1).run(Duration::from_millis(5), tx));

        assert!(matches!(rx.recv().await, Some(SyntheticEvent::Ready)));
        assert!(matches!(rx.recv().await, Some(SyntheticEvent::Depth(_))));
        assert!(matches!(rx.recv().await, Some(SyntheticEvent::Depth(_))));
        assert!(matches!(rx.recv().await, Some(SyntheticEvent::Trade(_))));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("feed should exit")
            .unwrap();
    }
}
