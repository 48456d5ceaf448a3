//! Order Book Visualizer - live book and trade tape library
//!
//! This crate maintains a client-side order book for one Binance pair from its
//! diff-depth and aggregate-trade push streams, publishes immutable snapshots
//! at a fixed cadence, and derives the sorted, totalled rows a renderer needs.
//! A synthetic feed with the same output shape stands in when the exchange is
//! unreachable.

pub mod config;
pub mod error;
pub mod metrics;
pub mod mock;
pub mod orderbook;
pub mod parser;
pub mod publisher;
pub mod server;
pub mod session;
pub mod view;
pub mod websocket;

pub use config::{Config, FeedMode};
pub use error::{FeedError, Result};
pub use metrics::FeedMetrics;
pub use mock::MockFeed;
pub use orderbook::{OrderBook, PriceLevel, Side, SideTable, Trade, TradeSide, TradeTape};
pub use parser::{AggTrade, DepthDiff, FeedMessage, PriceLevelUpdate, StreamKind};
pub use publisher::{Snapshot, SnapshotPublisher};
pub use session::{FeedSource, SessionHandle, SessionManager};
pub use view::{BookRow, DepthLadder, OrderBookView, Spread};
pub use websocket::{ConnectionTracker, WebSocketClient};
