//! Order book module
//!
//! Client-side book state built from Binance diff-depth updates, plus the
//! bounded tape of recent trades.

mod book;
mod table;
mod tape;

pub use book::OrderBook;
pub use table::SideTable;
pub use tape::{Trade, TradeSide, TradeTape, DEFAULT_TRADE_CAPACITY};

use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

/// A single resting level: exchange price string and its quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: String,
    pub quantity: f64,
}
