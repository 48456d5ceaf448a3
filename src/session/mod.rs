//! Session module
//!
//! A session owns the book, the trade tape and the connection state for one
//! symbol subscription. It runs as a single task: stream tasks and the
//! synthetic feed send it events, it applies them one at a time, and it
//! publishes a snapshot on a fixed period. Stopping the session aborts every
//! task it spawned, including pending reconnect delays.

mod state;

pub use state::{Reconnect, SessionCore};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::metrics::FeedMetrics;
use crate::mock::{MockFeed, SyntheticEvent};
use crate::parser::StreamKind;
use crate::publisher::{Snapshot, SnapshotPublisher};
use crate::websocket::{run_stream, StreamEvent, WebSocketClient};

const EVENT_QUEUE_CAPACITY: usize = 4096;

/// Data source of a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Live,
    Mock,
}

/// Everything the session task consumes
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Stream(StreamEvent),
    Synthetic(SyntheticEvent),
}

impl From<StreamEvent> for SessionEvent {
    fn from(event: StreamEvent) -> Self {
        SessionEvent::Stream(event)
    }
}

impl From<SyntheticEvent> for SessionEvent {
    fn from(event: SyntheticEvent) -> Self {
        SessionEvent::Synthetic(event)
    }
}

/// Owner's handle on a running session
///
/// Dropping the handle also shuts the session down.
pub struct SessionHandle {
    symbol: String,
    source: FeedSource,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
}

impl SessionHandle {
    /// Spawn a session task; must be called inside a tokio runtime
    pub fn start(config: &Config, source: FeedSource, metrics: Arc<FeedMetrics>) -> Self {
        let publisher = SnapshotPublisher::new(Snapshot::empty(
            &config.symbol,
            source == FeedSource::Mock,
        ));
        let snapshots = publisher.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let core = SessionCore::new(config, source, metrics.clone());
        let runner = SessionRunner {
            core,
            publisher,
            metrics,
            config: config.clone(),
            source,
        };

        info!(symbol = %config.symbol, source = ?source, "Starting session");
        let task = tokio::spawn(runner.run(shutdown_rx));

        Self {
            symbol: config.symbol.clone(),
            source,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            snapshots,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn source(&self) -> FeedSource {
        self.source
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the session and wait until every socket and timer is released
    ///
    /// Safe to call repeatedly and from any state.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(symbol = %self.symbol, error = %e, "Session task panicked");
                }
            }
            info!(symbol = %self.symbol, "Session stopped");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

struct SessionRunner {
    core: SessionCore,
    publisher: SnapshotPublisher,
    metrics: Arc<FeedMetrics>,
    config: Config,
    source: FeedSource,
}

impl SessionRunner {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(EVENT_QUEUE_CAPACITY);
        let mut tasks = JoinSet::new();

        match self.source {
            FeedSource::Live => {
                for kind in StreamKind::ALL {
                    self.spawn_stream(&mut tasks, &events_tx, kind, Duration::ZERO);
                }
            }
            FeedSource::Mock => {
                let feed = MockFeed::new();
                tasks.spawn(feed.run(self.config.mock_interval(), events_tx.clone()));
            }
        }

        let mut ticker = interval(self.config.publish_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(event) = events_rx.recv() => {
                    if let Some(reconnect) = self.core.handle(event) {
                        self.spawn_stream(&mut tasks, &events_tx, reconnect.kind, reconnect.delay);
                    }
                }
                _ = ticker.tick() => {
                    self.publisher.publish(self.core.snapshot());
                    self.metrics.snapshots.inc();
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "Feed task panicked");
                        }
                    }
                }
            }
        }

        self.core.stop();
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        events_rx.close();
        debug!(
            symbol = %self.core.symbol(),
            published = self.publisher.published(),
            "Session task exiting"
        );
    }

    fn spawn_stream(
        &mut self,
        tasks: &mut JoinSet<()>,
        events: &mpsc::Sender<SessionEvent>,
        kind: StreamKind,
        delay: Duration,
    ) {
        let Some(attempt) = self.core.begin_attempt(kind) else {
            return;
        };
        let client = WebSocketClient::new(&self.config.ws_endpoint, &self.config.symbol, kind);
        tasks.spawn(run_stream(client, attempt, delay, events.clone()));
    }
}

/// Keeps at most one session alive
pub struct SessionManager {
    config: Config,
    metrics: Arc<FeedMetrics>,
    active: Option<SessionHandle>,
}

impl SessionManager {
    pub fn new(config: Config, metrics: Arc<FeedMetrics>) -> Self {
        Self {
            config,
            metrics,
            active: None,
        }
    }

    /// Start a session for `symbol`, fully stopping any previous one first
    pub async fn start(&mut self, symbol: &str, source: FeedSource) -> watch::Receiver<Arc<Snapshot>> {
        self.stop().await;

        let mut config = self.config.clone();
        config.symbol = symbol.to_lowercase();
        let handle = SessionHandle::start(&config, source, self.metrics.clone());
        let snapshots = handle.subscribe();
        self.active = Some(handle);
        snapshots
    }

    pub async fn stop(&mut self) {
        if let Some(mut handle) = self.active.take() {
            handle.stop().await;
        }
    }

    pub fn active(&self) -> Option<&SessionHandle> {
        self.active.as_ref()
    }
}
