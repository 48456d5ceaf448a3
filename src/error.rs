//! Error types for the order book visualizer

use thiserror::Error;

/// Feed, session and configuration errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("Invalid price level [{price}, {quantity}]")]
    InvalidPriceLevel { price: String, quantity: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Session is no longer running")]
    SessionClosed,

    #[error("Max reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl From<prometheus::Error> for FeedError {
    fn from(err: prometheus::Error) -> Self {
        FeedError::Metrics(err.to_string())
    }
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        FeedError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
