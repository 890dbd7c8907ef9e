//! Manual rollback, and the restore step shared with apply's recovery path.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use crate::effects::StackEffects;
use crate::error::{ControlError, ControlResult};
use crate::health::{HealthSource, HealthSummary};
use crate::observability::metrics;
use crate::snapshot::SnapshotManager;
use crate::store::{ConfigFiles, ConfigStore};

/// Read the snapshot for `version_id`, overlay it on `base`, and write the
/// full result back. Roles the snapshot lacks keep their `base` text.
pub(crate) async fn restore_and_write(
    store: &ConfigStore,
    snapshots: &SnapshotManager,
    version_id: &str,
    base: &ConfigFiles,
) -> ControlResult<ConfigFiles> {
    let restored = snapshots.restore(version_id).await?;
    let merged = base.merged_with(&restored);
    store.save(&merged.to_partial()).await?;
    tracing::info!(
        version_id = %version_id,
        restored_roles = restored.len(),
        "Snapshot restored to live files"
    );
    Ok(merged)
}

/// Result of a manual rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    /// True when the stack is healthy after the rollback.
    pub success: bool,
    pub version_id: String,
    pub restarted: Vec<String>,
    pub health: HealthSummary,
}

/// Restores a previously snapshotted version on request.
///
/// There is no safety net here: no new snapshot is taken first, and a failed
/// rollback is not undone.
#[derive(Clone)]
pub struct RollbackOrchestrator {
    store: ConfigStore,
    snapshots: SnapshotManager,
    effects: StackEffects,
    health: Arc<dyn HealthSource>,
}

impl RollbackOrchestrator {
    pub fn new(
        store: ConfigStore,
        snapshots: SnapshotManager,
        effects: StackEffects,
        health: Arc<dyn HealthSource>,
    ) -> Self {
        Self {
            store,
            snapshots,
            effects,
            health,
        }
    }

    /// Roll back to `requested`, or to the newest successful version.
    ///
    /// A requested id must appear in the version log.
    pub async fn rollback(
        &self,
        requested: Option<&str>,
        write_guard: OwnedMutexGuard<()>,
    ) -> ControlResult<RollbackOutcome> {
        let version_id = match requested.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                let logged = self
                    .snapshots
                    .read_versions()
                    .await?
                    .iter()
                    .any(|record| record.id == id);
                if !logged {
                    return Err(ControlError::UnknownVersion(id.to_string()));
                }
                id.to_string()
            }
            None => self
                .snapshots
                .last_successful()
                .await?
                .map(|record| record.id)
                .ok_or(ControlError::NoSuccessfulVersion)?,
        };

        if !self.snapshots.exists(&version_id).await {
            return Err(ControlError::UnknownVersion(version_id));
        }

        tracing::info!(version_id = %version_id, "Manual rollback starting");

        // Once files start changing, finish on a task the caller cannot cancel.
        let this = self.clone();
        tokio::spawn(async move {
            let _write_guard = write_guard;
            let result = this.run(&version_id).await;
            metrics::record_rollback(
                "manual",
                matches!(&result, Ok(outcome) if outcome.success),
            );
            result
        })
        .await
        .map_err(|e| ControlError::Internal(format!("rollback task failed: {}", e)))?
    }

    async fn run(&self, version_id: &str) -> ControlResult<RollbackOutcome> {
        let current = self.store.load_raw().await?;
        restore_and_write(&self.store, &self.snapshots, version_id, &current).await?;
        self.effects.reload().await?;
        let restarted = self.effects.restart_all().await?;

        let health = self.health.check().await;
        if health.healthy {
            tracing::info!(version_id = %version_id, "Manual rollback complete, stack healthy");
        } else {
            tracing::warn!(
                version_id = %version_id,
                failing = ?health.failing(),
                "Manual rollback complete, stack unhealthy"
            );
        }

        Ok(RollbackOutcome {
            success: health.healthy,
            version_id: version_id.to_string(),
            restarted,
            health,
        })
    }
}
