//! Core order book implementation
//!
//! Two unordered price level tables updated in arrival order. Ordering is a
//! presentation concern handled by `crate::view`.

use super::{PriceLevel, Side, SideTable};
use crate::parser::DepthDiff;

/// Order book for the subscribed symbol
#[derive(Debug, Default)]
pub struct OrderBook {
    bids: SideTable,
    asks: SideTable,
    /// Event time of the last applied diff, when the feed supplied one
    last_update_time: Option<u64>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a depth diff: bids first, then asks, each in arrival order
    ///
    /// Returns the number of level changes applied.
    pub fn apply_diff(&mut self, diff: &DepthDiff) -> usize {
        for level in &diff.bids {
            self.bids.apply_update(&level.price, level.quantity);
        }

        for level in &diff.asks {
            self.asks.apply_update(&level.price, level.quantity);
        }

        if diff.event_time.is_some() {
            self.last_update_time = diff.event_time;
        }

        diff.bids.len() + diff.asks.len()
    }

    /// Apply a single level change to one side
    pub fn apply_level(&mut self, side: Side, price: &str, quantity: f64) {
        self.side_mut(side).apply_update(price, quantity);
    }

    pub fn side(&self, side: Side) -> &SideTable {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideTable {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    pub fn bids(&self) -> Vec<PriceLevel> {
        self.bids.levels()
    }

    pub fn asks(&self) -> Vec<PriceLevel> {
        self.asks.levels()
    }

    pub fn last_update_time(&self) -> Option<u64> {
        self.last_update_time
    }

    /// Drop every level on both sides
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.last_update_time = None;
    }
}
