//! relayd - Straylight Relay
//!
//! A directed messaging relay: clients log in with a display name and send
//! JSON messages to each other by name. Messages for names that are not
//! online are kept and delivered when that name next logs in.

mod config;
mod error;
mod handlers;
mod http;
mod metrics;
mod network;
mod offline;
mod state;
mod telemetry;

use crate::config::Config;
use crate::network::Gateway;
use crate::state::{Hub, HubParams};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "relayd.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    let lanes = config.server.lane_count();
    info!(
        server = %config.server.name,
        lanes,
        backend = ?config.offline.backend,
        "Starting relayd"
    );

    let offline = offline::open(&config.offline).map_err(|e| {
        error!(path = %config.offline.path, error = %e, "Failed to open offline store");
        e
    })?;

    let hub = Hub::new(
        HubParams {
            server_name: config.server.name.clone(),
            lanes,
            outbound_queue: config.limits.outbound_queue,
        },
        offline,
    );

    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");

        let http_hub = hub.clone();
        tokio::spawn(async move {
            http::run_http_server(metrics_port, http_hub).await;
        });
        info!(port = metrics_port, "HTTP server started");
    }

    let gateway = Gateway::bind(
        config.listen.address,
        hub.clone(),
        config.listen.max_line_length,
    )
    .await?;

    tokio::select! {
        result = gateway.run() => {
            if let Err(e) = result {
                error!(error = %e, "Gateway stopped");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!(server = %hub.server_name, "Shutting down");
        }
    }

    Ok(())
}
