//! Parser module for Binance WebSocket messages
//!
//! Normalizes diff-depth and aggregate-trade events into the update operations
//! the order book understands. A message is accepted or rejected as a whole:
//! one bad price level rejects the entire event.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{FeedError, Result};

/// The two push topics a session subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Depth,
    Trade,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::Depth, StreamKind::Trade];

    /// Stream name as used in the endpoint path, e.g. `btcusdt@depth`
    pub fn stream_name(&self, symbol: &str) -> String {
        match self {
            StreamKind::Depth => format!("{}@depth", symbol.to_lowercase()),
            StreamKind::Trade => format!("{}@aggTrade", symbol.to_lowercase()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Depth => "depth",
            StreamKind::Trade => "trade",
        }
    }

    /// Value of the `e` field carried by events of this stream
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamKind::Depth => "depthUpdate",
            StreamKind::Trade => "aggTrade",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binance diff-depth event (`<symbol>@depth`)
///
/// Sequence fields are carried through but not used for gap detection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepthDiff {
    /// Event type
    #[serde(rename = "e", default)]
    pub event_type: Option<String>,

    /// Event time (milliseconds)
    #[serde(rename = "E", default)]
    pub event_time: Option<u64>,

    /// Symbol
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,

    /// First update ID in event
    #[serde(rename = "U", default)]
    pub first_update_id: Option<u64>,

    /// Final update ID in event
    #[serde(rename = "u", default)]
    pub final_update_id: Option<u64>,

    /// Final update ID of the previous event
    #[serde(rename = "pu", default)]
    pub previous_update_id: Option<u64>,

    /// Bids to update
    #[serde(rename = "b", default, deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<PriceLevelUpdate>,

    /// Asks to update
    #[serde(rename = "a", default, deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<PriceLevelUpdate>,
}

/// Binance aggregate trade event (`<symbol>@aggTrade`)
#[derive(Debug, Clone, Deserialize)]
pub struct AggTrade {
    /// Event type
    #[serde(rename = "e", default)]
    pub event_type: Option<String>,

    /// Event time
    #[serde(rename = "E", default)]
    pub event_time: Option<u64>,

    /// Symbol
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,

    /// Aggregate trade ID
    #[serde(rename = "a")]
    pub agg_trade_id: u64,

    /// Price
    #[serde(rename = "p", deserialize_with = "deserialize_f64_str")]
    pub price: f64,

    /// Quantity
    #[serde(rename = "q", deserialize_with = "deserialize_f64_str")]
    pub quantity: f64,

    /// First trade ID
    #[serde(rename = "f", default)]
    pub first_trade_id: Option<u64>,

    /// Last trade ID
    #[serde(rename = "l", default)]
    pub last_trade_id: Option<u64>,

    /// Trade time
    #[serde(rename = "T")]
    pub trade_time: u64,

    /// Is the buyer the market maker
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

/// One price level change: quantity zero means "remove this level"
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevelUpdate {
    /// Exchange price string, kept verbatim as the table key
    pub price: String,
    pub quantity: f64,
}

impl PriceLevelUpdate {
    /// Validate a `[price, quantity]` pair from the wire
    pub fn parse(price: &str, quantity: &str) -> Result<Self> {
        let invalid = || FeedError::InvalidPriceLevel {
            price: price.to_string(),
            quantity: quantity.to_string(),
        };

        let decimal = Decimal::from_str(price).map_err(|_| invalid())?;
        if decimal.is_sign_negative() {
            return Err(invalid());
        }

        let qty = f64::from_str(quantity.trim()).map_err(|_| invalid())?;
        if !qty.is_finite() || qty < 0.0 {
            return Err(invalid());
        }

        Ok(Self {
            price: price.to_string(),
            quantity: qty,
        })
    }
}

/// Combined stream message wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    /// Stream name
    pub stream: String,

    /// Data payload
    pub data: Value,
}

/// Parsed WebSocket message
#[derive(Debug, Clone)]
pub enum FeedMessage {
    Depth(DepthDiff),
    Trade(AggTrade),
    /// Well-formed, but not an event this stream consumes
    Ignored(String),
}

impl FeedMessage {
    /// Parse a raw text frame received on `kind`'s socket
    pub fn parse(kind: StreamKind, raw: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(raw)?;

        // Unwrap combined-stream envelopes
        if value.get("stream").is_some() && value.get("data").is_some() {
            let envelope: StreamMessage = serde_json::from_value(value)?;
            value = envelope.data;
        }

        if !value.is_object() {
            return Err(FeedError::ParseError(format!(
                "expected a JSON object on the {kind} stream"
            )));
        }

        // Subscription acks and foreign events share the socket
        if value.get("result").is_some() && value.get("id").is_some() {
            return Ok(FeedMessage::Ignored("subscription".to_string()));
        }
        match value.get("e").and_then(Value::as_str) {
            Some(event) if event != kind.event_type() => {
                return Ok(FeedMessage::Ignored(event.to_string()));
            }
            _ => {}
        }

        match kind {
            StreamKind::Depth => Ok(FeedMessage::Depth(serde_json::from_value(value)?)),
            StreamKind::Trade => Ok(FeedMessage::Trade(serde_json::from_value(value)?)),
        }
    }
}

/// Custom deserializer for a finite f64 carried as a string
fn deserialize_f64_str<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    let value = f64::from_str(s.trim()).map_err(serde::de::Error::custom)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom(format!("non-finite number `{s}`")));
    }
    Ok(value)
}

/// Custom deserializer for price levels from array of string pairs
fn deserialize_price_levels<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<PriceLevelUpdate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<String>> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|pair| {
            if pair.len() != 2 {
                return Err(serde::de::Error::custom("Invalid price level format"));
            }
            PriceLevelUpdate::parse(&pair[0], &pair[1]).map_err(serde::de::Error::custom)
        })
        .collect()
}
