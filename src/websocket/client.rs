//! WebSocket client for a single Binance stream
//!
//! Handles connection, keepalive replies, and message reception.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::error::{FeedError, Result};
use crate::parser::StreamKind;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client for one stream of one symbol
pub struct WebSocketClient {
    stream: Option<WsStream>,
    url: String,
    kind: StreamKind,
}

impl WebSocketClient {
    /// Create a new WebSocket client for `<endpoint>/<symbol>@<stream>`
    pub fn new(endpoint: &str, symbol: &str, kind: StreamKind) -> Self {
        Self {
            stream: None,
            url: stream_url(endpoint, symbol, kind),
            kind,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Connect to the stream endpoint
    pub async fn connect(&mut self) -> Result<()> {
        info!(stream = %self.kind, url = %self.url, "Connecting to Binance WebSocket");

        let (ws_stream, response) = connect_async(self.url.as_str()).await.map_err(|e| {
            FeedError::WebSocketConnection(format!("Failed to connect: {}", e))
        })?;

        info!(stream = %self.kind, status = ?response.status(), "WebSocket connected");
        self.stream = Some(ws_stream);

        Ok(())
    }

    /// Receive the next message
    ///
    /// `Ok(None)` is returned for control frames that carry no data.
    pub async fn recv(&mut self) -> Result<Option<String>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| FeedError::WebSocketConnection("Not connected".to_string()))?;

        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!(stream = %self.kind, len = text.len(), "Received text message");
                Ok(Some(text))
            }
            Some(Ok(Message::Binary(data))) => {
                let text = String::from_utf8_lossy(&data).to_string();
                Ok(Some(text))
            }
            Some(Ok(Message::Ping(data))) => {
                debug!(stream = %self.kind, "Received ping, sending pong");
                if let Some(stream) = self.stream.as_mut() {
                    let _ = stream.send(Message::Pong(data)).await;
                }
                Ok(None)
            }
            Some(Ok(Message::Pong(_))) => Ok(None),
            Some(Ok(Message::Close(frame))) => {
                warn!(stream = %self.kind, frame = ?frame, "Received close frame");
                self.stream = None;
                Err(FeedError::WebSocketConnection(
                    "Connection closed".to_string(),
                ))
            }
            Some(Ok(Message::Frame(_))) => Ok(None),
            Some(Err(e)) => {
                warn!(stream = %self.kind, error = %e, "WebSocket error");
                self.stream = None;
                Err(FeedError::WebSocketMessage(e.to_string()))
            }
            None => {
                warn!(stream = %self.kind, "WebSocket stream ended");
                self.stream = None;
                Err(FeedError::WebSocketConnection(
                    "Stream ended".to_string(),
                ))
            }
        }
    }

    /// Send a ping to keep connection alive
    pub async fn ping(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            stream
                .send(Message::Ping(vec![]))
                .await
                .map_err(|e| FeedError::WebSocketMessage(e.to_string()))?;
        }
        Ok(())
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Close the connection
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}

/// Build the per-stream endpoint URL
pub fn stream_url(endpoint: &str, symbol: &str, kind: StreamKind) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        kind.stream_name(symbol)
    )
}
