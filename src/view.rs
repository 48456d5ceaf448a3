//! Derived views over a snapshot
//!
//! Pure functions: the same snapshot always yields the same ladders, spread
//! and frame. Prices are ordered by their exact decimal value and only
//! converted to floating point for display arithmetic.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::orderbook::{PriceLevel, Side, Trade, TradeSide};
use crate::publisher::Snapshot;

/// Rows shown per side when no depth is configured
pub const DEFAULT_DISPLAY_DEPTH: usize = 15;

const BAR_WIDTH: usize = 12;
const TAPE_ROWS: usize = 15;

/// One displayed price level with its running total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookRow {
    pub price: f64,
    pub amount: f64,
    /// Sum of amounts from the best price down to this row
    pub total: f64,
}

impl BookRow {
    /// Depth bar width as a percentage of the side's deepest total
    pub fn bar_percent(&self, max_total: f64) -> f64 {
        if max_total > 0.0 {
            self.total / max_total * 100.0
        } else {
            0.0
        }
    }
}

/// Sorted, truncated and totalled rows for one side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthLadder {
    pub side: Side,
    pub rows: Vec<BookRow>,
    /// Cumulative total of the last row; zero for an empty side
    pub max_total: f64,
}

impl DepthLadder {
    /// Sort best-first, keep the top `depth`, then accumulate
    pub fn build(levels: &[PriceLevel], side: Side, depth: usize) -> Self {
        let mut keyed: Vec<(Decimal, &PriceLevel)> = levels
            .iter()
            .filter_map(|level| {
                Decimal::from_str(&level.price)
                    .ok()
                    .map(|price| (price, level))
            })
            .collect();

        match side {
            Side::Bid => keyed.sort_unstable_by(|a, b| b.0.cmp(&a.0)),
            Side::Ask => keyed.sort_unstable_by(|a, b| a.0.cmp(&b.0)),
        }
        keyed.truncate(depth);

        let mut cumulative = 0.0;
        let rows: Vec<BookRow> = keyed
            .into_iter()
            .map(|(_, level)| {
                cumulative += level.quantity;
                BookRow {
                    price: f64::from_str(&level.price).unwrap_or_default(),
                    amount: level.quantity,
                    total: cumulative,
                }
            })
            .collect();

        Self {
            side,
            rows,
            max_total: cumulative,
        }
    }

    /// Best price on this side, if any
    pub fn best_price(&self) -> Option<f64> {
        self.rows.first().map(|row| row.price)
    }

    pub fn bar_percents(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.bar_percent(self.max_total))
            .collect()
    }
}

/// Best ask minus best bid, and that gap relative to the best ask
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Spread {
    pub value: f64,
    pub percent: f64,
}

impl Spread {
    /// Zero when either side is empty; never NaN or infinite
    pub fn from_ladders(bids: &DepthLadder, asks: &DepthLadder) -> Self {
        let best_bid = bids.best_price().unwrap_or(0.0);
        let best_ask = asks.best_price().unwrap_or(0.0);

        let value = if best_bid != 0.0 && best_ask != 0.0 {
            best_ask - best_bid
        } else {
            0.0
        };
        let percent = if best_ask != 0.0 && value != 0.0 {
            value / best_ask * 100.0
        } else {
            0.0
        };

        Self { value, percent }
    }
}

/// Connection banner shown above the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Live,
    Disconnected,
    /// Synthetic data
    Demo,
}

impl FeedStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FeedStatus::Live => "Live",
            FeedStatus::Disconnected => "Disconnected",
            FeedStatus::Demo => "Demo",
        }
    }
}

/// Everything a renderer needs, derived from one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookView {
    pub symbol: String,
    pub timestamp: i64,
    pub status: FeedStatus,
    pub bids: DepthLadder,
    pub asks: DepthLadder,
    pub spread: Spread,
    pub trades: Vec<Trade>,
    pub error: Option<String>,
}

impl OrderBookView {
    pub fn from_snapshot(snapshot: &Snapshot, depth: usize) -> Self {
        let bids = DepthLadder::build(&snapshot.bids, Side::Bid, depth);
        let asks = DepthLadder::build(&snapshot.asks, Side::Ask, depth);
        let spread = Spread::from_ladders(&bids, &asks);

        let status = if snapshot.mock {
            FeedStatus::Demo
        } else if snapshot.connected {
            FeedStatus::Live
        } else {
            FeedStatus::Disconnected
        };

        Self {
            symbol: snapshot.symbol.clone(),
            timestamp: snapshot.timestamp,
            status,
            bids,
            asks,
            spread,
            trades: snapshot.trades.clone(),
            error: snapshot.error.clone(),
        }
    }
}

/// Ids of trades in `current` that were not in `previous`, newest first
pub fn fresh_trade_ids(previous: &[Trade], current: &[Trade]) -> Vec<u64> {
    let seen: HashSet<u64> = previous.iter().map(|trade| trade.id).collect();
    current
        .iter()
        .filter(|trade| !seen.contains(&trade.id))
        .map(|trade| trade.id)
        .collect()
}

/// Trade time as `HH:MM:SS` (UTC)
pub fn format_trade_time(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

fn depth_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(filled.min(BAR_WIDTH))
}

/// Fixed-width text frame: both ladders side by side, then the tape
pub fn render_frame(view: &OrderBookView, highlighted: &[u64]) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}  [{}]  spread {:.2} ({:.4}%)",
        view.symbol.to_uppercase(),
        view.status.label(),
        view.spread.value,
        view.spread.percent
    );
    if let Some(error) = &view.error {
        let _ = writeln!(out, "error: {error}");
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>12} {:>12} {:>12} {:<w$} | {:>12} {:>12} {:>12} {:<w$}",
        "BID PRICE",
        "AMOUNT",
        "TOTAL",
        "",
        "ASK PRICE",
        "AMOUNT",
        "TOTAL",
        "",
        w = BAR_WIDTH
    );

    let rows = view.bids.rows.len().max(view.asks.rows.len());
    for i in 0..rows {
        let left = view
            .bids
            .rows
            .get(i)
            .map(|row| ladder_cell(row, view.bids.max_total))
            .unwrap_or_else(blank_cell);
        let right = view
            .asks
            .rows
            .get(i)
            .map(|row| ladder_cell(row, view.asks.max_total))
            .unwrap_or_else(blank_cell);
        let _ = writeln!(out, "{left} | {right}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "RECENT TRADES");
    let _ = writeln!(out, "{:>12} {:>12} {:>10}", "PRICE", "AMOUNT", "TIME");
    for trade in view.trades.iter().take(TAPE_ROWS) {
        let side = match trade.side {
            TradeSide::Buy => "buy ",
            TradeSide::Sell => "sell",
        };
        let marker = if highlighted.contains(&trade.id) { "*" } else { " " };
        let _ = writeln!(
            out,
            "{:>12.2} {:>12.4} {:>10} {side}{marker}",
            trade.price,
            trade.quantity,
            format_trade_time(trade.timestamp)
        );
    }

    out
}

fn ladder_cell(row: &BookRow, max_total: f64) -> String {
    format!(
        "{:>12.2} {:>12.4} {:>12.4} {:<w$}",
        row.price,
        row.amount,
        row.total,
        depth_bar(row.bar_percent(max_total)),
        w = BAR_WIDTH
    )
}

fn blank_cell() -> String {
    format!("{:>12} {:>12} {:>12} {:<w$}", "", "", "", "", w = BAR_WIDTH)
}
