//! HTTP side channel: Prometheus metrics and a health summary.
//!
//! Runs on a separate tokio task. `/metrics` is for Prometheus scraping,
//! `/healthz` reports the hub's lane loads and session counts as JSON.

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::state::Hub;

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Handler for GET /healthz.
async fn health_handler(State(hub): State<Arc<Hub>>) -> Json<Value> {
    let lanes = hub.lane_loads();
    let sessions: usize = lanes.iter().sum();
    Json(json!({
        "status": "ok",
        "server": hub.server_name,
        "lanes": lanes,
        "sessions": sessions,
        "authenticated": hub.directory().len(),
    }))
}

pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .with_state(hub)
}

/// Run the HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_http_server(port: u16, hub: Arc<Hub>) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, router(hub)).await {
        tracing::error!("HTTP server error: {}", e);
    }
}
