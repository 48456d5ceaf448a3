//! Stream tasks feeding the session
//!
//! Each connect attempt is one task: wait out the reconnect delay, connect,
//! forward frames, report the close, exit. Reconnect decisions belong to the
//! session; the task never loops on its own.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::WebSocketClient;
use crate::error::FeedError;
use crate::parser::StreamKind;

/// Silence after which the connection is probed with a ping
const RECV_TIMEOUT: Duration = Duration::from_secs(45);

/// Lifecycle and data signals of one connect attempt
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    Opened,
    Frame(String),
    /// Socket closed or errored, with or without having opened
    Closed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub kind: StreamKind,
    /// Connect attempt the signal belongs to
    pub attempt: u64,
    pub signal: StreamSignal,
}

/// Run one connect attempt, reporting through `events`
///
/// Generic over the event type so the session can wrap stream events in its
/// own message enum.
pub async fn run_stream<E>(
    mut client: WebSocketClient,
    attempt: u64,
    delay: Duration,
    events: mpsc::Sender<E>,
) where
    E: From<StreamEvent> + Send + 'static,
{
    let kind = client.kind();
    let report = |signal: StreamSignal| {
        E::from(StreamEvent {
            kind,
            attempt,
            signal,
        })
    };

    if !delay.is_zero() {
        debug!(stream = %kind, attempt, delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
        sleep(delay).await;
    }

    let reason = match client.connect().await {
        Ok(()) => {
            if events.send(report(StreamSignal::Opened)).await.is_err() {
                client.close().await;
                return;
            }
            match forward_frames(&mut client, &events, &report).await {
                Some(reason) => reason,
                None => {
                    // Session went away
                    client.close().await;
                    return;
                }
            }
        }
        Err(e) => e.to_string(),
    };

    client.close().await;
    info!(stream = %kind, attempt, reason = %reason, "Stream closed");
    let _ = events.send(report(StreamSignal::Closed(reason))).await;
}

/// Forward text frames until the socket fails
///
/// Returns the failure reason, or `None` if the receiver was dropped.
async fn forward_frames<E, F>(
    client: &mut WebSocketClient,
    events: &mpsc::Sender<E>,
    report: &F,
) -> Option<String>
where
    F: Fn(StreamSignal) -> E,
{
    let mut last_message = Instant::now();

    loop {
        match timeout(RECV_TIMEOUT, client.recv()).await {
            Ok(Ok(Some(text))) => {
                last_message = Instant::now();
                if events.send(report(StreamSignal::Frame(text))).await.is_err() {
                    return None;
                }
            }
            Ok(Ok(None)) => continue,
            Ok(Err(e)) => return Some(e.to_string()),
            Err(_) => {
                warn!(
                    stream = %client.kind(),
                    last_message_secs = last_message.elapsed().as_secs(),
                    "No message received within timeout, sending keepalive"
                );
                if let Err(e) = client.ping().await {
                    warn!(error = %e, "Failed to send keepalive ping");
                    return Some(FeedError::ConnectionTimeout.to_string());
                }
            }
        }
    }
}

/// Check whether the live depth stream can be opened within `wait`
pub async fn probe(endpoint: &str, symbol: &str, wait: Duration) -> bool {
    let mut client = WebSocketClient::new(endpoint, symbol, StreamKind::Depth);

    match timeout(wait, client.connect()).await {
        Ok(Ok(())) => {
            info!(url = %client.url(), "Live connection probe succeeded");
            client.close().await;
            true
        }
        Ok(Err(e)) => {
            warn!(url = %client.url(), error = %e, "Live connection probe failed");
            false
        }
        Err(_) => {
            warn!(url = %client.url(), timeout_secs = wait.as_secs(), "Live connection probe timed out");
            false
        }
    }
}
