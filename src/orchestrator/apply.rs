//! The apply transaction.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;

use crate::config::TopologyConfig;
use crate::effects::StackEffects;
use crate::error::{ControlError, ControlResult};
use crate::health::{HealthSource, HealthSummary};
use crate::observability::metrics;
use crate::orchestrator::rollback::restore_and_write;
use crate::orchestrator::{
    build_candidate, needs_reload, restart_targets, ApplyOutcome, ApplyRequest, ApplyStage,
};
use crate::snapshot::{SnapshotManager, VersionClock, VersionRecord};
use crate::store::{ConfigFiles, ConfigStore};
use crate::validation::{self, ValidationResult};

const HEALTH_FAILURE: &str = "health checks failed after apply";

/// Recovery steps, run in order after a post-write failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compensation {
    /// Put the snapshot back on disk. Failure here is fail-stop.
    RestoreFiles,
    ReissueReload,
    RestartAll,
}

const COMPENSATIONS: [Compensation; 3] = [
    Compensation::RestoreFiles,
    Compensation::ReissueReload,
    Compensation::RestartAll,
];

/// Why the post-write stages did not commit.
struct StageFailure {
    stage: ApplyStage,
    message: String,
    health: Option<HealthSummary>,
}

impl StageFailure {
    fn error(stage: ApplyStage, error: ControlError) -> Self {
        Self {
            stage,
            message: error.to_string(),
            health: None,
        }
    }
}

/// Drives one apply attempt from snapshot to a terminal stage.
///
/// Callers must serialize attempts; the snapshot-then-write sequence is not
/// compare-and-swap safe.
#[derive(Clone)]
pub struct ApplyOrchestrator {
    store: ConfigStore,
    snapshots: SnapshotManager,
    effects: StackEffects,
    health: Arc<dyn HealthSource>,
    clock: Arc<VersionClock>,
    topology: TopologyConfig,
}

impl ApplyOrchestrator {
    pub fn new(
        store: ConfigStore,
        snapshots: SnapshotManager,
        effects: StackEffects,
        health: Arc<dyn HealthSource>,
        topology: TopologyConfig,
    ) -> Self {
        Self {
            store,
            snapshots,
            effects,
            health,
            clock: Arc::new(VersionClock::new()),
            topology,
        }
    }

    /// Run one attempt. `write_guard` is released when the attempt reaches a
    /// terminal stage, even if the caller stops waiting for it.
    ///
    /// `Err` is returned only when nothing was attempted (loading or
    /// snapshotting failed) or the background commit task died. Every other
    /// failure is reported in the outcome.
    pub async fn apply(
        &self,
        request: &ApplyRequest,
        write_guard: OwnedMutexGuard<()>,
    ) -> ControlResult<ApplyOutcome> {
        let started = Instant::now();

        // The snapshot holds the bytes on disk; candidates build on the normalized view.
        let on_disk = self.store.load_raw().await?;
        let current = self.store.normalized(&on_disk);
        if let Some(last) = self.snapshots.read_versions().await?.last() {
            self.clock.observe(&last.id);
        }
        let version_id = self.clock.next_id();

        tracing::info!(version_id = %version_id, stage = ApplyStage::Snapshotting.as_str(), "Apply attempt started");
        self.snapshots.snapshot(&version_id, &on_disk).await?;

        tracing::debug!(version_id = %version_id, stage = ApplyStage::Validating.as_str(), "Validating candidate");
        let candidate = match build_candidate(
            &current,
            request,
            &self.effects.services().scraper,
            &self.store.paths().generated_rules_include,
        ) {
            Ok(candidate) => candidate,
            Err(e) => {
                return self
                    .reject(&version_id, ValidationResult::rejected(e.to_string()), started)
                    .await
            }
        };

        let validation = validation::validate_with(
            &self.topology,
            &candidate.scraper,
            &candidate.collector,
            &candidate.trace_backend,
        );
        if !validation.valid {
            return self.reject(&version_id, validation, started).await;
        }

        // From here on live state changes; finish on a task the caller cannot cancel.
        let this = self.clone();
        tokio::spawn(async move {
            let _write_guard = write_guard;
            this.commit(version_id, on_disk, candidate, validation, started)
                .await
        })
        .await
        .map_err(|e| ControlError::Internal(format!("apply task failed: {}", e)))?
    }

    async fn reject(
        &self,
        version_id: &str,
        validation: ValidationResult,
        started: Instant,
    ) -> ControlResult<ApplyOutcome> {
        let error = validation.errors.join("; ");
        tracing::warn!(version_id = %version_id, stage = ApplyStage::Rejected.as_str(), errors = %error, "Candidate rejected");
        self.snapshots
            .append_version(VersionRecord::failed(version_id, error.clone()))
            .await?;
        metrics::record_apply(ApplyStage::Rejected.as_str(), started);

        let mut outcome = ApplyOutcome::new(version_id, ApplyStage::Rejected);
        outcome.validation = Some(validation);
        outcome.error = Some(error);
        Ok(outcome)
    }

    async fn commit(
        self,
        version_id: String,
        on_disk: ConfigFiles,
        candidate: ConfigFiles,
        validation: ValidationResult,
        started: Instant,
    ) -> ControlResult<ApplyOutcome> {
        let mut restarted = Vec::new();
        let failure = match self
            .run_effects(&version_id, &on_disk, &candidate, &mut restarted)
            .await
        {
            Ok(health) if health.healthy => {
                self.record(VersionRecord::succeeded(&version_id)).await;
                metrics::record_apply(ApplyStage::Committed.as_str(), started);
                tracing::info!(
                    version_id = %version_id,
                    stage = ApplyStage::Committed.as_str(),
                    restarted = ?restarted,
                    "Apply committed"
                );

                let mut outcome = ApplyOutcome::new(&version_id, ApplyStage::Committed);
                outcome.success = true;
                outcome.validation = Some(validation);
                outcome.restarted = restarted;
                outcome.health = Some(health);
                return Ok(outcome);
            }
            Ok(health) => StageFailure {
                stage: ApplyStage::HealthChecking,
                message: HEALTH_FAILURE.to_string(),
                health: Some(health),
            },
            Err(failure) => failure,
        };

        tracing::warn!(
            version_id = %version_id,
            failed_stage = failure.stage.as_str(),
            error = %failure.message,
            "Apply failed after writing, rolling back"
        );

        let mut outcome = self.compensate(&version_id, &on_disk, &failure).await;
        outcome.validation = Some(validation);
        outcome.restarted = restarted;
        outcome.health = failure.health;
        metrics::record_apply(outcome.stage.as_str(), started);
        Ok(outcome)
    }

    async fn run_effects(
        &self,
        version_id: &str,
        current: &ConfigFiles,
        candidate: &ConfigFiles,
        restarted: &mut Vec<String>,
    ) -> Result<HealthSummary, StageFailure> {
        let changed = candidate.changed_roles(current);

        tracing::info!(
            version_id = %version_id,
            stage = ApplyStage::Writing.as_str(),
            changed = ?changed.roles(),
            "Writing candidate"
        );
        self.store
            .save(&candidate.to_partial())
            .await
            .map_err(|e| StageFailure::error(ApplyStage::Writing, e))?;

        let targets = restart_targets(&changed, self.effects.services());
        if !targets.is_empty() {
            tracing::info!(version_id = %version_id, stage = ApplyStage::Restarting.as_str(), services = ?targets, "Restarting changed services");
            match self.effects.restart_services(&targets).await {
                Ok(names) => *restarted = names,
                Err(failure) => {
                    *restarted = failure.restarted;
                    return Err(StageFailure::error(ApplyStage::Restarting, failure.error));
                }
            }
        }

        if needs_reload(&changed) {
            tracing::info!(version_id = %version_id, stage = ApplyStage::Reloading.as_str(), "Reloading scraper");
            self.effects
                .reload()
                .await
                .map_err(|e| StageFailure::error(ApplyStage::Reloading, e))?;
        }

        tracing::debug!(version_id = %version_id, stage = ApplyStage::HealthChecking.as_str(), "Checking stack health");
        Ok(self.health.check().await)
    }

    /// Run the recovery steps and record the failed attempt.
    async fn compensate(
        &self,
        version_id: &str,
        current: &ConfigFiles,
        failure: &StageFailure,
    ) -> ApplyOutcome {
        tracing::info!(version_id = %version_id, stage = ApplyStage::RollingBack.as_str(), "Rolling back");

        let mut notes = Vec::new();
        for step in COMPENSATIONS {
            let result = match step {
                Compensation::RestoreFiles => {
                    restore_and_write(&self.store, &self.snapshots, version_id, current)
                        .await
                        .map(|_| ())
                }
                Compensation::ReissueReload => self.effects.reload().await,
                Compensation::RestartAll => self
                    .effects
                    .restart_all()
                    .await
                    .map(|_| ())
                    .map_err(ControlError::from),
            };

            match (step, result) {
                (_, Ok(())) => {}
                (Compensation::RestoreFiles, Err(e)) => {
                    return self.fail_stop(version_id, failure, e).await;
                }
                (step, Err(e)) => {
                    tracing::warn!(version_id = %version_id, step = ?step, error = %e, "Recovery step failed");
                    notes.push(e.to_string());
                }
            }
        }

        let error = if notes.is_empty() {
            failure.message.clone()
        } else {
            format!("{} (recovery: {})", failure.message, notes.join("; "))
        };
        self.record(VersionRecord::failed(version_id, error)).await;
        metrics::record_rollback("automatic", true);
        tracing::warn!(version_id = %version_id, stage = ApplyStage::RolledBack.as_str(), "Rolled back to pre-apply state");

        let mut outcome = ApplyOutcome::new(version_id, ApplyStage::RolledBack);
        outcome.error = Some(failure.message.clone());
        outcome.rolled_back = true;
        if !notes.is_empty() {
            outcome.rollback_error = Some(notes.join("; "));
        }
        outcome
    }

    async fn fail_stop(
        &self,
        version_id: &str,
        failure: &StageFailure,
        rollback_error: ControlError,
    ) -> ApplyOutcome {
        let combined = ControlError::Rollback {
            apply_error: failure.message.clone(),
            rollback_error: rollback_error.to_string(),
        };
        tracing::error!(
            version_id = %version_id,
            stage = ApplyStage::RollbackFailed.as_str(),
            error = %combined,
            "Rollback failed, live configuration may be inconsistent"
        );
        self.record(VersionRecord::failed(version_id, combined.to_string()))
            .await;
        metrics::record_rollback("automatic", false);

        let mut outcome = ApplyOutcome::new(version_id, ApplyStage::RollbackFailed);
        outcome.error = Some(failure.message.clone());
        outcome.rollback_error = Some(rollback_error.to_string());
        outcome.inconsistent = true;
        outcome
    }

    /// Append to the version log after live state has changed. The outcome
    /// stands even if the log write fails.
    async fn record(&self, record: VersionRecord) {
        let id = record.id.clone();
        if let Err(e) = self.snapshots.append_version(record).await {
            tracing::error!(version_id = %id, error = %e, "Failed to append version record");
        }
    }
}
