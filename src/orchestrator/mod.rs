//! The configuration transaction.
//!
//! # Data Flow
//! ```text
//! ApplyRequest
//!     → Snapshotting   (load current, take full snapshot under a fresh version id)
//!     → Validating     (build candidate, cross-file rules)
//!         → Rejected   (record failure, touch nothing)
//!     → Writing → Restarting → Reloading → HealthChecking
//!         → Committed  (record success)
//!         → RollingBack (restore snapshot, reload, restart everything)
//!             → RolledBack | RollbackFailed
//! ```
//!
//! # Design Decisions
//! - Validation failure never mutates anything; post-write failure always compensates
//! - Stages from Writing onward run on a spawned task so a dropped caller cannot abandon them
//! - Restore-and-rewrite failing during recovery is fail-stop; nothing further is attempted
//! - Exactly one version record per attempt, except when the snapshot itself fails

pub mod apply;
pub mod rollback;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ServicesConfig;
use crate::error::ControlResult;
use crate::health::HealthSummary;
use crate::store::{simple, ChangedRoles, ConfigFiles, Role, SimpleOverrides};
use crate::validation::ValidationResult;

pub use apply::ApplyOrchestrator;
pub use rollback::{RollbackOrchestrator, RollbackOutcome};

/// A proposed change: structured overrides, raw per-role text, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyRequest {
    pub simple: Option<SimpleOverrides>,
    pub raw: BTreeMap<Role, String>,
}

impl ApplyRequest {
    pub fn raw(role: Role, content: impl Into<String>) -> Self {
        let mut raw = BTreeMap::new();
        raw.insert(role, content.into());
        Self { simple: None, raw }
    }

    pub fn simple(overrides: SimpleOverrides) -> Self {
        Self {
            simple: Some(overrides),
            raw: BTreeMap::new(),
        }
    }
}

/// Merge `request` over `current`. Simple overrides apply first, then raw text
/// replaces whole roles. Empty raw texts are ignored.
pub fn build_candidate(
    current: &ConfigFiles,
    request: &ApplyRequest,
    scraper_service: &str,
    generated_rules_include: &str,
) -> ControlResult<ConfigFiles> {
    let mut candidate = match &request.simple {
        Some(overrides) => simple::apply_overrides(
            current,
            overrides,
            scraper_service,
            generated_rules_include,
        )?,
        None => current.clone(),
    };

    for (role, content) in &request.raw {
        if !content.is_empty() {
            candidate.set(*role, content.clone());
        }
    }
    Ok(candidate)
}

/// Where an apply attempt is, or where it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStage {
    Idle,
    Snapshotting,
    Validating,
    Rejected,
    Writing,
    Restarting,
    Reloading,
    HealthChecking,
    Committed,
    RollingBack,
    RolledBack,
    RollbackFailed,
}

impl ApplyStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyStage::Idle => "idle",
            ApplyStage::Snapshotting => "snapshotting",
            ApplyStage::Validating => "validating",
            ApplyStage::Rejected => "rejected",
            ApplyStage::Writing => "writing",
            ApplyStage::Restarting => "restarting",
            ApplyStage::Reloading => "reloading",
            ApplyStage::HealthChecking => "health_checking",
            ApplyStage::Committed => "committed",
            ApplyStage::RollingBack => "rolling_back",
            ApplyStage::RolledBack => "rolled_back",
            ApplyStage::RollbackFailed => "rollback_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplyStage::Rejected
                | ApplyStage::Committed
                | ApplyStage::RolledBack
                | ApplyStage::RollbackFailed
        )
    }
}

/// Result of one apply attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub success: bool,
    pub version_id: String,
    pub stage: ApplyStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    pub restarted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rolled_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_error: Option<String>,
    /// Set when recovery itself failed and the live files may not match any version.
    pub inconsistent: bool,
}

impl ApplyOutcome {
    fn new(version_id: &str, stage: ApplyStage) -> Self {
        Self {
            success: false,
            version_id: version_id.to_string(),
            stage,
            validation: None,
            restarted: Vec::new(),
            health: None,
            error: None,
            rolled_back: false,
            rollback_error: None,
            inconsistent: false,
        }
    }
}

/// Services to restart for the roles that changed.
pub fn restart_targets(changed: &ChangedRoles, services: &ServicesConfig) -> Vec<String> {
    let mapping = [
        (Role::Collector, &services.collector),
        (Role::LogBackend, &services.log_backend),
        (Role::TraceBackend, &services.trace_backend),
        (Role::Compose, &services.scraper),
    ];
    mapping
        .into_iter()
        .filter(|(role, _)| changed.contains(*role))
        .map(|(_, service)| service.clone())
        .collect()
}

/// Whether the scraper must re-read its configuration.
pub fn needs_reload(changed: &ChangedRoles) -> bool {
    changed.any(&[
        Role::Scraper,
        Role::Compose,
        Role::AlertRules,
        Role::GeneratedAlertRules,
    ])
}
