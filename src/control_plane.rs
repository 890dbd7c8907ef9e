//! The control plane facade used by the HTTP API.
//!
//! Owns the store, snapshot manager, orchestrators and collaborators, and
//! serializes every mutating operation behind a single-writer lock.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::alerts::{self, CreateAlertRequest, Rule, RuleFile};
use crate::config::ControlPlaneConfig;
use crate::effects::{
    ContainerControl, DisabledContainerControl, DockerCli, HttpReloadSignal, ReloadSignal,
    StackEffects,
};
use crate::error::ControlResult;
use crate::health::{HealthSource, HttpHealthChecker, ScrapeTarget, SignalReader, StackStatus};
use crate::orchestrator::{
    build_candidate, ApplyOrchestrator, ApplyOutcome, ApplyRequest, RollbackOrchestrator,
    RollbackOutcome,
};
use crate::snapshot::{SnapshotManager, VersionRecord};
use crate::store::{simple, ConfigFiles, ConfigStore, Role, SimpleConfig};
use crate::validation::{self, ValidationResult};

/// Current configuration in both views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentConfig {
    pub simple: SimpleConfig,
    pub raw: ConfigFiles,
}

/// Parsed rule files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertsView {
    pub base: RuleFile,
    pub generated: RuleFile,
}

/// Rule files as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRules {
    pub base_raw: String,
    pub generated_raw: String,
}

/// Result of creating an alert: the rule and the apply that committed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAlertOutcome {
    pub rule: Rule,
    pub apply: ApplyOutcome,
}

pub struct ControlPlane {
    config: ControlPlaneConfig,
    store: ConfigStore,
    snapshots: SnapshotManager,
    containers: Arc<dyn ContainerControl>,
    health: Arc<dyn HealthSource>,
    signals: SignalReader,
    apply: ApplyOrchestrator,
    rollback: RollbackOrchestrator,
    /// Held from the start of a write until its spawned commit finishes.
    write_lock: Arc<Mutex<()>>,
}

impl ControlPlane {
    /// Build with the real docker, reload and health collaborators.
    pub fn new(config: ControlPlaneConfig) -> Self {
        let client = reqwest::Client::new();

        let containers: Arc<dyn ContainerControl> = if config.services.docker_control_enabled {
            Arc::new(DockerCli::new())
        } else {
            Arc::new(DisabledContainerControl)
        };
        let reload: Arc<dyn ReloadSignal> = Arc::new(HttpReloadSignal::new(
            client.clone(),
            config.endpoints.reload_url(),
        ));
        let health: Arc<dyn HealthSource> = Arc::new(HttpHealthChecker::new(
            client,
            config.endpoints.health_probes(),
            config.timeouts.probe(),
        ));

        Self::with_collaborators(config, containers, reload, health)
    }

    pub fn with_collaborators(
        config: ControlPlaneConfig,
        containers: Arc<dyn ContainerControl>,
        reload: Arc<dyn ReloadSignal>,
        health: Arc<dyn HealthSource>,
    ) -> Self {
        let io_timeout = config.timeouts.file_io();
        let store = ConfigStore::new(config.paths.clone(), io_timeout);
        let snapshots = SnapshotManager::new(&config.paths, io_timeout);
        let effects = StackEffects::new(
            containers.clone(),
            reload,
            config.services.clone(),
            config.timeouts.clone(),
            config.reload.clone(),
            config.apply.restart_failures_fatal,
        );

        let apply = ApplyOrchestrator::new(
            store.clone(),
            snapshots.clone(),
            effects.clone(),
            health.clone(),
            config.topology.clone(),
        );
        let rollback =
            RollbackOrchestrator::new(store.clone(), snapshots.clone(), effects, health.clone());
        let signals = SignalReader::new(
            reqwest::Client::new(),
            &config.endpoints,
            config.timeouts.probe(),
        );

        Self {
            config,
            store,
            snapshots,
            containers,
            health,
            signals,
            apply,
            rollback,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the telemetry signal reader.
    pub fn with_signals(mut self, signals: SignalReader) -> Self {
        self.signals = signals;
        self
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    pub async fn current_config(&self) -> ControlResult<CurrentConfig> {
        let raw = self.store.load().await?;
        let (db_running, host_running) = if self.config.services.docker_control_enabled {
            tokio::join!(
                self.containers
                    .is_running(&self.config.services.db_profile_container),
                self.containers
                    .is_running(&self.config.services.host_profile_container),
            )
        } else {
            (false, false)
        };

        Ok(CurrentConfig {
            simple: simple::describe(&raw, db_running, host_running),
            raw,
        })
    }

    /// Validate a candidate without applying it.
    pub async fn validate(&self, request: &ApplyRequest) -> ControlResult<ValidationResult> {
        let current = self.store.load().await?;
        let candidate = match build_candidate(
            &current,
            request,
            &self.config.services.scraper,
            &self.config.paths.generated_rules_include,
        ) {
            Ok(candidate) => candidate,
            Err(e) => return Ok(ValidationResult::rejected(e.to_string())),
        };
        Ok(validation::validate_with(
            &self.config.topology,
            &candidate.scraper,
            &candidate.collector,
            &candidate.trace_backend,
        ))
    }

    pub async fn apply(&self, request: &ApplyRequest) -> ControlResult<ApplyOutcome> {
        let guard = self.write_lock.clone().lock_owned().await;
        self.apply.apply(request, guard).await
    }

    pub async fn rollback(&self, version_id: Option<&str>) -> ControlResult<RollbackOutcome> {
        let guard = self.write_lock.clone().lock_owned().await;
        self.rollback.rollback(version_id, guard).await
    }

    /// Wait until no apply or rollback is in flight, including ones whose
    /// caller has gone away.
    pub async fn wait_idle(&self) {
        let _guard = self.write_lock.lock().await;
    }

    pub async fn history(&self) -> ControlResult<Vec<VersionRecord>> {
        self.snapshots.read_versions().await
    }

    pub async fn status(&self) -> StackStatus {
        let (health, signals) = tokio::join!(self.health.check(), self.signals.collect());
        StackStatus { health, signals }
    }

    pub async fn targets(&self) -> ControlResult<Vec<ScrapeTarget>> {
        self.signals.targets().await
    }

    pub async fn alerts(&self) -> ControlResult<AlertsView> {
        let raw = self.raw_rules().await?;
        Ok(AlertsView {
            base: alerts::parse_rule_file(&raw.base_raw, "alert rules")?,
            generated: alerts::parse_rule_file(&raw.generated_raw, "generated alert rules")?,
        })
    }

    pub async fn raw_rules(&self) -> ControlResult<RawRules> {
        let (base_raw, generated_raw) = tokio::try_join!(
            self.store.read_role(Role::AlertRules),
            self.store.read_role(Role::GeneratedAlertRules),
        )?;
        Ok(RawRules {
            base_raw,
            generated_raw,
        })
    }

    /// Build a rule from a template and commit it through an apply.
    pub async fn create_alert(
        &self,
        request: &CreateAlertRequest,
    ) -> ControlResult<CreateAlertOutcome> {
        let rule = alerts::build_rule(request)?;

        let guard = self.write_lock.clone().lock_owned().await;
        let current = self.store.read_role(Role::GeneratedAlertRules).await?;
        let merged = alerts::merge_generated_rule(&current, rule.clone())?;

        tracing::info!(alert = ?rule.alert, template = %request.template, "Committing generated alert rule");
        let apply = self
            .apply
            .apply(&ApplyRequest::raw(Role::GeneratedAlertRules, merged), guard)
            .await?;

        Ok(CreateAlertOutcome { rule, apply })
    }
}
