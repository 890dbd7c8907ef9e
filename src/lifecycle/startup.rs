//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Build the control plane and make sure the state directory exists
//! - Bind the API listener and serve until shutdown
//! - Let in-flight applies and rollbacks finish before returning

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ControlPlaneConfig;
use crate::control_plane::ControlPlane;
use crate::http::ApiServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::store::files;

/// Run the control plane until a shutdown signal arrives.
///
/// Logging must already be initialized.
pub async fn run(config: ControlPlaneConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.server.bind_address,
        compose_dir = %config.paths.compose_dir.display(),
        state_dir = %config.paths.state_dir.display(),
        docker_control = config.services.docker_control_enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    files::ensure_dir(&config.paths.versions_dir()).await?;

    let bind_address = config.server.bind_address.clone();
    let plane = Arc::new(ControlPlane::new(config));
    let server = ApiServer::new(plane.clone());

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    server.run(listener, shutdown.subscribe()).await?;

    // Commits outlive their requests; let them reach a terminal stage
    tracing::info!("Waiting for in-flight configuration changes");
    plane.wait_idle().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
