//! HTTP surface: health, metrics and the latest snapshot
//!
//! The presentation layer polls `/book` (derived rows and spread) or
//! `/snapshot` (raw, unordered levels) instead of touching session state.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::metrics::FeedMetrics;
use crate::publisher::Snapshot;
use crate::view::OrderBookView;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub snapshots: watch::Receiver<Arc<Snapshot>>,
    pub metrics: Arc<FeedMetrics>,
    pub display_depth: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/snapshot", get(snapshot))
        .route("/book", get(book))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_on<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "Starting HTTP server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let latest = state.snapshots.borrow().clone();
    Json(serde_json::json!({
        "status": "healthy",
        "component": "order-book-visualizer",
        "symbol": latest.symbol,
        "connected": latest.connected,
        "mock": latest.mock,
        "error": latest.error,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(state): State<AppState>) -> std::result::Result<String, (StatusCode, String)> {
    state
        .metrics
        .encode()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn snapshot(State(state): State<AppState>) -> Json<Snapshot> {
    let latest = state.snapshots.borrow().clone();
    Json(latest.as_ref().clone())
}

async fn book(State(state): State<AppState>) -> Json<OrderBookView> {
    let latest = state.snapshots.borrow().clone();
    Json(OrderBookView::from_snapshot(&latest, state.display_depth))
}
