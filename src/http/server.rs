//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every API route
//! - Wire up middleware (request id, tracing, body limit, read timeouts)
//! - Serve until the shutdown signal fires

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::control_plane::ControlPlane;
use crate::http::handlers;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub plane: Arc<ControlPlane>,
}

/// HTTP server for the control plane API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    pub fn new(plane: Arc<ControlPlane>) -> Self {
        let config = plane.config().server.clone();
        let router = Self::build_router(&config, AppState { plane });
        Self { router }
    }

    /// Router with all middleware applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Apply, rollback and alert creation carry no request timeout: once
    /// they start writing they run to a terminal state.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let reads = Router::new()
            .route("/healthz", get(handlers::healthz))
            .route("/api/status", get(handlers::get_status))
            .route("/api/targets", get(handlers::get_targets))
            .route("/api/config", get(handlers::get_config))
            .route("/api/config/validate", post(handlers::validate_config))
            .route("/api/version-history", get(handlers::version_history))
            .route("/api/rules/raw", get(handlers::raw_rules))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_secs)));

        let writes = Router::new()
            .route("/api/config/apply", post(handlers::apply_config))
            .route("/api/config/rollback", post(handlers::rollback_config))
            .route(
                "/api/alerts",
                get(handlers::list_alerts).post(handlers::create_alert),
            );

        reads.merge(writes).with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(config.max_body_size)),
        )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
