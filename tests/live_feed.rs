use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use order_book_visualizer::{
    server::{self, AppState},
    session::{FeedSource, SessionHandle},
    websocket::UNABLE_TO_CONNECT,
    Config, FeedMetrics, OrderBookView, Snapshot, TradeSide,
};
use serde_json::{json, Value};
use tokio::{
    net::TcpListener,
    sync::{oneshot, watch},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        Message,
    },
};

#[derive(Clone, Default)]
struct MockUpstreamState {
    connection_count: Arc<AtomicUsize>,
    active_connections: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
}

fn depth_frames() -> Vec<String> {
    vec![
        json!({
            "e": "depthUpdate", "E": 1_700_000_000_000u64, "s": "BTCUSDT",
            "U": 1, "u": 2,
            "b": [["100.00", "1.5"]],
            "a": [["101.00", "2.0"]]
        })
        .to_string(),
        "not json at all".to_string(),
        json!({
            "e": "depthUpdate", "E": 1_700_000_000_100u64, "s": "BTCUSDT",
            "U": 3, "u": 3,
            "b": [["100.00", "0"], ["99.50", "0.75"]],
            "a": []
        })
        .to_string(),
    ]
}

fn trade_frames() -> Vec<String> {
    vec![json!({
        "e": "aggTrade", "E": 1_700_000_000_050u64, "s": "BTCUSDT",
        "a": 42, "p": "100.50", "q": "0.2", "f": 1, "l": 1,
        "T": 1_700_000_000_040u64, "m": true
    })
    .to_string()]
}

async fn upstream_connection(stream: tokio::net::TcpStream, state: MockUpstreamState) {
    let mut path = String::new();
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        path = request.uri().path().to_string();
        Ok(response)
    };
    let Ok(socket) = accept_hdr_async(stream, callback).await else {
        return;
    };

    state.connection_count.fetch_add(1, Ordering::SeqCst);
    state.active_connections.fetch_add(1, Ordering::SeqCst);
    state.paths.lock().unwrap().push(path.clone());

    let (mut sender, mut receiver) = socket.split();
    let frames = if path.ends_with("@depth") {
        depth_frames()
    } else {
        trade_frames()
    };
    for frame in frames {
        if sender.send(Message::Text(frame)).await.is_err() {
            break;
        }
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.active_connections.fetch_sub(1, Ordering::SeqCst);
}

async fn spawn_upstream() -> (String, MockUpstreamState, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener
        .local_addr()
        .expect("listener should expose address");
    let state = MockUpstreamState::default();

    let accept_state = state.clone();
    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(upstream_connection(stream, accept_state.clone()));
        }
    });

    (format!("ws://127.0.0.1:{}/ws", addr.port()), state, task)
}

async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("ws://127.0.0.1:{}/ws", port)
}

fn live_config(endpoint: &str) -> Config {
    Config {
        ws_endpoint: endpoint.to_string(),
        reconnect_delay_ms: 10,
        publish_interval_ms: 10,
        ..Config::default()
    }
}

async fn wait_for<F>(
    snapshots: &mut watch::Receiver<Arc<Snapshot>>,
    mut predicate: F,
) -> Arc<Snapshot>
where
    F: FnMut(&Snapshot) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = snapshots.borrow_and_update().clone();
                if predicate(&snapshot) {
                    return snapshot;
                }
            }
            snapshots
                .changed()
                .await
                .expect("session should keep publishing");
        }
    })
    .await
    .expect("snapshot condition should be reached")
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition should be reached");
}

#[tokio::test]
async fn live_session_builds_book_and_tape_from_upstream() {
    let (endpoint, upstream, upstream_task) = spawn_upstream().await;
    let metrics = Arc::new(FeedMetrics::new().unwrap());
    let mut handle = SessionHandle::start(&live_config(&endpoint), FeedSource::Live, metrics.clone());
    let mut snapshots = handle.subscribe();

    let snapshot = wait_for(&mut snapshots, |s| {
        s.connected && s.bids.len() == 1 && s.asks.len() == 1 && s.trades.len() == 1
    })
    .await;

    assert!(!snapshot.mock);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.bids[0].price, "99.50");
    assert_eq!(snapshot.bids[0].quantity, 0.75);
    assert_eq!(snapshot.asks[0].price, "101.00");
    assert_eq!(snapshot.trades[0].id, 42);
    assert_eq!(snapshot.trades[0].price, 100.5);
    assert_eq!(snapshot.trades[0].side, TradeSide::Sell);

    let view = OrderBookView::from_snapshot(&snapshot, 15);
    assert_eq!(view.spread.value, 1.5);

    let mut paths = upstream.paths.lock().unwrap().clone();
    paths.sort();
    assert_eq!(paths, vec!["/ws/btcusdt@aggTrade", "/ws/btcusdt@depth"]);

    assert_eq!(metrics.depth_updates.get(), 2);
    assert_eq!(metrics.trades.get(), 1);
    assert_eq!(metrics.malformed.with_label_values(&["depth"]).get(), 1);
    assert_eq!(metrics.connected.get(), 1);

    handle.stop().await;
    upstream_task.abort();
}

#[tokio::test]
async fn stop_releases_upstream_connections() {
    let (endpoint, upstream, upstream_task) = spawn_upstream().await;
    let metrics = Arc::new(FeedMetrics::new().unwrap());
    let mut handle = SessionHandle::start(&live_config(&endpoint), FeedSource::Live, metrics.clone());
    let mut snapshots = handle.subscribe();

    wait_for(&mut snapshots, |s| s.connected).await;
    let active = upstream.active_connections.clone();
    wait_until(|| active.load(Ordering::SeqCst) == 2).await;

    handle.stop().await;
    assert!(!handle.is_running());

    wait_until(|| active.load(Ordering::SeqCst) == 0).await;

    // Nothing reconnects once stopped
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(upstream.connection_count.load(Ordering::SeqCst), 2);
    snapshots.borrow_and_update();
    assert!(snapshots.changed().await.is_err());

    upstream_task.abort();
}

#[tokio::test]
async fn unreachable_endpoint_gives_up_after_max_attempts() {
    let endpoint = closed_endpoint().await;
    let metrics = Arc::new(FeedMetrics::new().unwrap());
    let mut handle = SessionHandle::start(&live_config(&endpoint), FeedSource::Live, metrics.clone());
    let mut snapshots = handle.subscribe();

    let snapshot = wait_for(&mut snapshots, |s| s.error.is_some()).await;

    assert!(!snapshot.connected);
    assert_eq!(snapshot.error.as_deref(), Some(UNABLE_TO_CONNECT));
    assert!(snapshot.bids.is_empty());
    assert!(snapshot.trades.is_empty());

    let reconnects = || {
        metrics.reconnects.with_label_values(&["depth"]).get()
            + metrics.reconnects.with_label_values(&["trade"]).get()
    };
    assert_eq!(reconnects(), 4);

    // Terminal: no further retries are scheduled
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(reconnects(), 4);
    assert_eq!(handle.latest().error.as_deref(), Some(UNABLE_TO_CONNECT));

    handle.stop().await;
}

#[tokio::test]
async fn http_surface_serves_mock_session() {
    let config = Config {
        publish_interval_ms: 10,
        mock_interval_ms: 5,
        ..Config::default()
    };
    let metrics = Arc::new(FeedMetrics::new().unwrap());
    let mut handle = SessionHandle::start(&config, FeedSource::Mock, metrics.clone());
    let mut snapshots = handle.subscribe();
    wait_for(&mut snapshots, |s| s.connected && !s.trades.is_empty()).await;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let base = format!("http://{}", listener.local_addr().unwrap());
    let state = AppState {
        snapshots: handle.subscribe(),
        metrics,
        display_depth: 5,
    };
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(server::serve_on(listener, state, async {
        let _ = shutdown_rx.await;
    }));

    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["symbol"], "btcusdt");
    assert_eq!(health["mock"], true);

    let book: Value = client
        .get(format!("{base}/book"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(book["bids"]["rows"].as_array().unwrap().len(), 5);
    assert_eq!(book["asks"]["rows"].as_array().unwrap().len(), 5);
    assert_eq!(book["bids"]["side"], "bid");
    assert_eq!(book["status"], "demo");

    let snapshot: Snapshot = client
        .get(format!("{base}/snapshot"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(snapshot.mock);
    assert!(!snapshot.bids.is_empty());

    let metrics_text = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics_text.contains("orderbook_snapshots_total"));
    assert!(metrics_text.contains("orderbook_trades_total"));

    let _ = shutdown.send(());
    tokio_test::assert_ok!(server_task.await.unwrap());
    handle.stop().await;
}
