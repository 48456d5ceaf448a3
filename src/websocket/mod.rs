//! WebSocket module for Binance connection management

mod client;
mod manager;
mod tracker;

pub use client::{stream_url, WebSocketClient};
pub use manager::{probe, run_stream, StreamEvent, StreamSignal};
pub use tracker::{ConnectionTracker, ReconnectDecision, StreamState, UNABLE_TO_CONNECT};
