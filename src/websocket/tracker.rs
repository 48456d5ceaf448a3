//! Connection state machine for the depth and trade streams
//!
//! Both streams share one failure budget. Once it is spent no reconnect is
//! ever scheduled again for the session.

use std::time::Duration;

use crate::parser::StreamKind;

/// Error surfaced once the retry budget is exhausted
pub const UNABLE_TO_CONNECT: &str =
    "Unable to connect to Binance. Network may be blocking WebSocket connections.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    /// Gave up; no further reconnects
    Terminal,
}

/// What to do after a stream closed or errored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry(Duration),
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    depth: StreamState,
    trade: StreamState,
    failures: u32,
    max_attempts: u32,
    delay: Duration,
    error: Option<String>,
}

impl ConnectionTracker {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            depth: StreamState::Disconnected,
            trade: StreamState::Disconnected,
            failures: 0,
            max_attempts,
            delay,
            error: None,
        }
    }

    pub fn state(&self, kind: StreamKind) -> StreamState {
        match kind {
            StreamKind::Depth => self.depth,
            StreamKind::Trade => self.trade,
        }
    }

    fn state_mut(&mut self, kind: StreamKind) -> &mut StreamState {
        match kind {
            StreamKind::Depth => &mut self.depth,
            StreamKind::Trade => &mut self.trade,
        }
    }

    /// Mark a connect attempt as started
    ///
    /// Returns false (and changes nothing) if the stream already gave up.
    pub fn begin_connect(&mut self, kind: StreamKind) -> bool {
        let state = self.state_mut(kind);
        if *state == StreamState::Terminal {
            return false;
        }
        *state = StreamState::Connecting;
        true
    }

    pub fn on_open(&mut self, kind: StreamKind) {
        let state = self.state_mut(kind);
        if *state != StreamState::Terminal {
            *state = StreamState::Connected;
        }
    }

    /// Record a close or error, whether or not the socket ever opened
    pub fn on_failure(&mut self, kind: StreamKind) -> ReconnectDecision {
        if self.state(kind) == StreamState::Terminal {
            return ReconnectDecision::GiveUp;
        }

        self.failures += 1;

        if self.failures < self.max_attempts {
            *self.state_mut(kind) = StreamState::Disconnected;
            ReconnectDecision::Retry(self.delay)
        } else {
            *self.state_mut(kind) = StreamState::Terminal;
            self.error = Some(UNABLE_TO_CONNECT.to_string());
            ReconnectDecision::GiveUp
        }
    }

    /// True only while both streams are open
    pub fn connected(&self) -> bool {
        self.depth == StreamState::Connected && self.trade == StreamState::Connected
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.error.is_some()
    }

    /// Forget all state, as for a brand new session
    pub fn reset(&mut self) {
        self.depth = StreamState::Disconnected;
        self.trade = StreamState::Disconnected;
        self.failures = 0;
        self.error = None;
    }
}
