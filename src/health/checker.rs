//! HTTP health probing.
//!
//! # Responsibilities
//! - Probe each configured service endpoint once, all in parallel
//! - Treat 2xx as healthy; anything else, a connection error, or a timeout as unhealthy

use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tokio::time;

use crate::config::ProbeConfig;
use crate::health::{HealthSource, HealthSummary, ServiceHealth};
use crate::observability::metrics;

pub struct HttpHealthChecker {
    client: reqwest::Client,
    probes: Vec<ProbeConfig>,
    timeout: Duration,
}

impl HttpHealthChecker {
    pub fn new(client: reqwest::Client, probes: Vec<ProbeConfig>, timeout: Duration) -> Self {
        Self {
            client,
            probes,
            timeout,
        }
    }

    pub fn probes(&self) -> &[ProbeConfig] {
        &self.probes
    }

    async fn probe(&self, probe: &ProbeConfig) -> ServiceHealth {
        let request = self
            .client
            .get(&probe.url)
            .header("user-agent", "faultline-health-check")
            .send();

        match time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    ServiceHealth::up()
                } else {
                    tracing::warn!(service = %probe.name, status = %status, "Health check failed: non-success status");
                    ServiceHealth::down(format!("http_{}", status.as_u16()))
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(service = %probe.name, error = %e, "Health check failed: connection error");
                ServiceHealth::down(e.to_string())
            }
            Err(_) => {
                tracing::warn!(service = %probe.name, "Health check failed: timeout");
                ServiceHealth::down(format!("timed out after {}ms", self.timeout.as_millis()))
            }
        }
    }
}

#[async_trait]
impl HealthSource for HttpHealthChecker {
    async fn check(&self) -> HealthSummary {
        let results = join_all(self.probes.iter().map(|probe| async move {
            (probe.name.clone(), self.probe(probe).await)
        }))
        .await;

        let summary = HealthSummary::from_services(results.into_iter().collect());
        metrics::record_stack_health(summary.healthy);
        summary
    }
}
