//! Order Book Visualizer
//!
//! Streams a Binance order book and trade tape for one pair, serves the
//! derived view over HTTP, and optionally draws it in the terminal.

use std::io::Write;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_book_visualizer::config::{Config, FeedMode};
use order_book_visualizer::server::{self, AppState};
use order_book_visualizer::session::{FeedSource, SessionManager};
use order_book_visualizer::view::{fresh_trade_ids, render_frame, OrderBookView};
use order_book_visualizer::websocket::probe;
use order_book_visualizer::{FeedMetrics, Snapshot, Trade};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration first: it decides where logs go
    let config = Config::load()?;
    init_logging(config.render_terminal);

    info!("Starting Order Book Visualizer");
    info!(symbol = %config.symbol, mode = ?config.feed_mode, "Configuration loaded");

    let source = resolve_source(&config).await;
    let metrics = Arc::new(FeedMetrics::new()?);

    let mut sessions = SessionManager::new(config.clone(), metrics.clone());
    let snapshots = sessions.start(&config.symbol, source).await;

    // Start HTTP server
    let (server_shutdown, server_shutdown_rx) = oneshot::channel::<()>();
    let state = AppState {
        snapshots: snapshots.clone(),
        metrics,
        display_depth: config.display_depth,
    };
    let addr = config.http_addr.clone();
    let server_task = tokio::spawn(async move {
        let shutdown = async {
            let _ = server_shutdown_rx.await;
        };
        if let Err(e) = server::serve(&addr, state, shutdown).await {
            warn!(error = %e, "HTTP server error");
        }
    });

    if config.render_terminal {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            result = render_loop(snapshots, config.display_depth) => result?,
        }
    } else {
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down");
    sessions.stop().await;
    let _ = server_shutdown.send(());
    let _ = server_task.await;

    Ok(())
}

fn init_logging(render_terminal: bool) {
    // Frames own stdout when rendering, so logs move to stderr
    let json_layer = (!render_terminal).then(|| fmt::layer().json());
    let stderr_layer = render_terminal.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();
}

async fn resolve_source(config: &Config) -> FeedSource {
    match config.feed_mode {
        FeedMode::Live => FeedSource::Live,
        FeedMode::Mock => FeedSource::Mock,
        FeedMode::Auto => {
            if probe(&config.ws_endpoint, &config.symbol, config.probe_timeout()).await {
                FeedSource::Live
            } else {
                warn!("Live feed unavailable, switching to synthetic data");
                FeedSource::Mock
            }
        }
    }
}

/// Redraw on every published snapshot until the session goes away
async fn render_loop(
    mut snapshots: watch::Receiver<Arc<Snapshot>>,
    depth: usize,
) -> anyhow::Result<()> {
    let mut previous: Vec<Trade> = Vec::new();
    let mut stdout = std::io::stdout();

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        let view = OrderBookView::from_snapshot(&snapshot, depth);
        let fresh = fresh_trade_ids(&previous, &snapshot.trades);

        write!(stdout, "\x1b[2J\x1b[H{}", render_frame(&view, &fresh))?;
        stdout.flush()?;

        previous = snapshot.trades.clone();
    }

    Ok(())
}
