//! Bounded tape of recent trades, newest first

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::parser::AggTrade;

/// Trades retained when no capacity is configured
pub const DEFAULT_TRADE_CAPACITY: usize = 50;

/// Aggressor side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// An executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange-assigned aggregate trade id
    pub id: u64,
    pub price: f64,
    pub quantity: f64,
    /// Trade time, epoch milliseconds
    pub timestamp: u64,
    pub side: TradeSide,
}

impl From<&AggTrade> for Trade {
    fn from(event: &AggTrade) -> Self {
        // Buyer resting as maker means the seller crossed the spread
        let side = if event.is_buyer_maker {
            TradeSide::Sell
        } else {
            TradeSide::Buy
        };

        Self {
            id: event.agg_trade_id,
            price: event.price,
            quantity: event.quantity,
            timestamp: event.trade_time,
            side,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeTape {
    trades: VecDeque<Trade>,
    capacity: usize,
}

impl TradeTape {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            trades: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert at the head, evicting the oldest once over capacity
    ///
    /// Returns false if a trade with the same id is already on the tape.
    pub fn push(&mut self, trade: Trade) -> bool {
        if self.trades.iter().any(|held| held.id == trade.id) {
            return false;
        }

        self.trades.push_front(trade);
        self.trades.truncate(self.capacity);
        true
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }

    /// Newest-first copy
    pub fn to_vec(&self) -> Vec<Trade> {
        self.trades.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }
}

impl Default for TradeTape {
    fn default() -> Self {
        Self::new(DEFAULT_TRADE_CAPACITY)
    }
}
