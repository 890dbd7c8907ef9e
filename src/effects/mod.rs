//! Side effects on the running stack: container restarts and the scraper reload.
//!
//! # Data Flow
//! ```text
//! Apply / rollback
//!     → StackEffects::restart_services (concurrent, one deadline per restart)
//!     → StackEffects::reload (bounded retries with backoff)
//!     → ContainerControl / ReloadSignal implementations
//! ```
//!
//! # Design Decisions
//! - The runtime and the reload endpoint sit behind traits so tests can count calls
//! - Restarts are never retried; only the reload signal is
//! - With container control disabled every restart is a logged no-op

pub mod docker;
pub mod reload;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use crate::config::{ReloadConfig, ServicesConfig, TimeoutConfig};
use crate::error::{ControlError, ControlResult};
use crate::observability::metrics;
use crate::resilience::backoff::reload_delay;
use crate::resilience::timeouts::with_timeout;

pub use docker::{DisabledContainerControl, DockerCli};
pub use reload::HttpReloadSignal;

/// Restarts containers and reports whether they are running.
#[async_trait]
pub trait ContainerControl: Send + Sync {
    async fn restart(&self, name: &str) -> ControlResult<()>;

    /// Inspection failures count as not running.
    async fn is_running(&self, name: &str) -> bool;
}

/// Tells the metrics scraper to re-read its configuration.
#[async_trait]
pub trait ReloadSignal: Send + Sync {
    async fn reload(&self) -> ControlResult<()>;
}

/// A fatal restart failure, with the services that did restart before it was reported.
#[derive(Debug)]
pub struct RestartFailure {
    pub restarted: Vec<String>,
    pub error: ControlError,
}

impl From<RestartFailure> for ControlError {
    fn from(failure: RestartFailure) -> Self {
        failure.error
    }
}

/// Restart and reload with deadlines, retries and metrics applied.
#[derive(Clone)]
pub struct StackEffects {
    containers: Arc<dyn ContainerControl>,
    reload: Arc<dyn ReloadSignal>,
    services: ServicesConfig,
    timeouts: TimeoutConfig,
    reload_policy: ReloadConfig,
    restart_failures_fatal: bool,
}

impl StackEffects {
    pub fn new(
        containers: Arc<dyn ContainerControl>,
        reload: Arc<dyn ReloadSignal>,
        services: ServicesConfig,
        timeouts: TimeoutConfig,
        reload_policy: ReloadConfig,
        restart_failures_fatal: bool,
    ) -> Self {
        Self {
            containers,
            reload,
            services,
            timeouts,
            reload_policy,
            restart_failures_fatal,
        }
    }

    pub fn services(&self) -> &ServicesConfig {
        &self.services
    }

    pub fn containers(&self) -> &Arc<dyn ContainerControl> {
        &self.containers
    }

    /// Restart `names` concurrently. Returns the names that restarted.
    ///
    /// With fatal restart failures (the default) the first failure is
    /// returned once every restart has finished, together with the names
    /// that did restart.
    pub async fn restart_services(&self, names: &[String]) -> Result<Vec<String>, RestartFailure> {
        if !self.services.docker_control_enabled {
            tracing::info!(services = ?names, "Container control disabled, skipping restarts");
            return Ok(Vec::new());
        }

        let limit = self.timeouts.restart();
        let restarts = names.iter().map(|name| async move {
            let operation = format!("restart {}", name);
            let result = with_timeout(&operation, limit, self.containers.restart(name)).await;
            metrics::record_restart(name, result.is_ok());
            (name.clone(), result)
        });

        let mut restarted = Vec::with_capacity(names.len());
        let mut first_error: Option<ControlError> = None;
        for (name, result) in join_all(restarts).await {
            match result {
                Ok(()) => {
                    tracing::info!(service = %name, "Service restarted");
                    restarted.push(name);
                }
                Err(e) if self.restart_failures_fatal => {
                    tracing::error!(service = %name, error = %e, "Service restart failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::warn!(service = %name, error = %e, "Service restart failed, continuing");
                }
            }
        }

        match first_error {
            Some(error) => Err(RestartFailure { restarted, error }),
            None => Ok(restarted),
        }
    }

    /// Restart every managed container.
    pub async fn restart_all(&self) -> Result<Vec<String>, RestartFailure> {
        let managed = self.services.managed.clone();
        self.restart_services(&managed).await
    }

    /// Signal the scraper to reload, retrying with backoff.
    pub async fn reload(&self) -> ControlResult<()> {
        let attempts = self.reload_policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let delay = reload_delay(attempt, &self.reload_policy);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match with_timeout("prometheus reload", self.timeouts.reload(), self.reload.reload())
                .await
            {
                Ok(()) => {
                    metrics::record_reload(true);
                    tracing::info!(attempt = attempt, "Scraper reloaded");
                    return Ok(());
                }
                Err(e) => {
                    metrics::record_reload(false);
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Reload attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ControlError::external("prometheus reload", "no attempts made")))
    }
}
