//! Configuration module for the order book visualizer

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{FeedError, Result};

/// Where book and trade data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Binance push streams
    Live,
    /// Synthetic generator
    Mock,
    /// Probe the live endpoint first, fall back to mock if it is unreachable
    Auto,
}

impl FromStr for FeedMode {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(FeedMode::Live),
            "mock" => Ok(FeedMode::Mock),
            "auto" => Ok(FeedMode::Auto),
            other => Err(FeedError::ConfigError(format!(
                "unknown feed mode `{other}` (expected live, mock or auto)"
            ))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Trading pair, lower-cased as Binance stream names expect (e.g. "btcusdt")
    pub symbol: String,

    /// Live, mock or auto-detected feed
    pub feed_mode: FeedMode,

    /// WebSocket base endpoint; stream names are appended as path segments
    pub ws_endpoint: String,

    /// Reconnection settings
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,

    /// Snapshot publication period
    pub publish_interval_ms: u64,

    /// Rows shown per side
    pub display_depth: usize,

    /// Recent trades retained
    pub trade_capacity: usize,

    /// Synthetic feed tick period
    pub mock_interval_ms: u64,

    /// How long `auto` mode waits for the live endpoint
    pub probe_timeout_secs: u64,

    /// Bind address of the HTTP server
    pub http_addr: String,

    /// Print text frames to stdout
    pub render_terminal: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let feed_mode = match env::var("FEED_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.feed_mode,
        };

        Ok(Self {
            symbol: env::var("SYMBOL")
                .map(|s| s.trim().to_lowercase())
                .unwrap_or(defaults.symbol),
            feed_mode,
            ws_endpoint: env::var("WS_ENDPOINT").unwrap_or(defaults.ws_endpoint),
            reconnect_delay_ms: env_or("RECONNECT_DELAY_MS", defaults.reconnect_delay_ms),
            max_reconnect_attempts: env_or(
                "MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            publish_interval_ms: env_or("PUBLISH_INTERVAL_MS", defaults.publish_interval_ms),
            display_depth: env_or("DISPLAY_DEPTH", defaults.display_depth),
            trade_capacity: env_or("TRADE_CAPACITY", defaults.trade_capacity),
            mock_interval_ms: env_or("MOCK_INTERVAL_MS", defaults.mock_interval_ms),
            probe_timeout_secs: env_or("PROBE_TIMEOUT_SECS", defaults.probe_timeout_secs),
            http_addr: env::var("HTTP_ADDR").unwrap_or(defaults.http_addr),
            render_terminal: env_or("RENDER_TERMINAL", defaults.render_terminal),
        })
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms.max(1))
    }

    pub fn mock_interval(&self) -> Duration {
        Duration::from_millis(self.mock_interval_ms.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Parse an env var, falling back to `default` when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "btcusdt".to_string(),
            feed_mode: FeedMode::Auto,
            ws_endpoint: "wss://data-stream.binance.com/ws".to_string(),
            reconnect_delay_ms: 3000,
            max_reconnect_attempts: 5,
            publish_interval_ms: 200,
            display_depth: 15,
            trade_capacity: 50,
            mock_interval_ms: 500,
            probe_timeout_secs: 5,
            http_addr: "0.0.0.0:9090".to_string(),
            render_terminal: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_mode_parse() {
        assert_eq!("live".parse::<FeedMode>().unwrap(), FeedMode::Live);
        assert_eq!(" MOCK ".parse::<FeedMode>().unwrap(), FeedMode::Mock);
        assert_eq!("auto".parse::<FeedMode>().unwrap(), FeedMode::Auto);
        assert!(matches!(
            "replay".parse::<FeedMode>(),
            Err(FeedError::ConfigError(_))
        ));
    }

    #[test]
    fn test_defaults_match_feed_constants() {
        let config = Config::default();
        assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.publish_interval(), Duration::from_millis(200));
        assert_eq!(config.display_depth, 15);
        assert_eq!(config.trade_capacity, 50);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("OBV_TEST_DEPTH", "not-a-number");
        assert_eq!(env_or("OBV_TEST_DEPTH", 15usize), 15);
        env::set_var("OBV_TEST_DEPTH", " 20 ");
        assert_eq!(env_or("OBV_TEST_DEPTH", 15usize), 20);
        env::remove_var("OBV_TEST_DEPTH");
        assert_eq!(env_or("OBV_TEST_DEPTH", 15usize), 15);
    }
}
