//! Post-apply health verification.
//!
//! # Data Flow
//! ```text
//! Apply / rollback reaches HealthChecking
//!     → HealthSource::check
//!     → checker.rs probes every configured endpoint in parallel
//!     → HealthSummary (per-service status + aggregate)
//! ```
//!
//! # Design Decisions
//! - One probe per service per check; no thresholds or flap damping
//! - `healthy` is the AND of every service's `ok`; an empty probe list is healthy
//! - A probe never errors: failures become `ok = false` with a detail string
//! - Telemetry signals (signals.rs) are reported alongside but never gate an apply

pub mod checker;
pub mod signals;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use checker::HttpHealthChecker;
pub use signals::{LastSeen, ScrapeTarget, SignalReader, StackStatus, TelemetrySignals};

/// Result of probing one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub ok: bool,
    pub detail: String,
}

impl ServiceHealth {
    pub fn up() -> Self {
        Self {
            ok: true,
            detail: "ok".to_string(),
        }
    }

    pub fn down(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Per-service status plus the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub services: BTreeMap<String, ServiceHealth>,
    pub healthy: bool,
}

impl HealthSummary {
    pub fn from_services(services: BTreeMap<String, ServiceHealth>) -> Self {
        let healthy = services.values().all(|s| s.ok);
        Self { services, healthy }
    }

    /// Names of the services that failed their probe.
    pub fn failing(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, s)| !s.ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Anything that can report the health of the stack.
#[async_trait]
pub trait HealthSource: Send + Sync {
    async fn check(&self) -> HealthSummary;
}
