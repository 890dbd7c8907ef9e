//! Snapshots and the version log.
//!
//! # Layout
//! ```text
//! <state_dir>/versions.json            append-only array of VersionRecord
//! <state_dir>/versions/<id>/<role>.snapshot
//! ```
//!
//! # Design Decisions
//! - A snapshot must be complete; a failed write removes the partial directory
//! - Restore returns only the roles whose files exist
//! - An unreadable version log is treated as empty so history stays available
//! - Only ids shaped like issued version ids map to a directory
//! - Snapshots are never deleted here

pub mod version;

use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::PathsConfig;
use crate::error::{ControlError, ControlResult};
use crate::resilience::timeouts::with_timeout;
use crate::store::files;
use crate::store::{ConfigFiles, PartialConfigFiles, Role};

pub use version::{is_version_id, VersionClock, VersionRecord};

/// Persists whole-file snapshots and the version log.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    versions_dir: PathBuf,
    log_path: PathBuf,
    io_timeout: Duration,
}

impl SnapshotManager {
    pub fn new(paths: &PathsConfig, io_timeout: Duration) -> Self {
        Self {
            versions_dir: paths.versions_dir(),
            log_path: paths.versions_log(),
            io_timeout,
        }
    }

    fn snapshot_dir(&self, id: &str) -> ControlResult<PathBuf> {
        if !is_version_id(id) {
            return Err(ControlError::UnknownVersion(id.to_string()));
        }
        Ok(self.versions_dir.join(id))
    }

    fn snapshot_file(dir: &Path, role: Role) -> PathBuf {
        dir.join(format!("{}.snapshot", role.as_str()))
    }

    /// Write every role under `id`. On any failure the partial directory is removed.
    pub async fn snapshot(&self, id: &str, current: &ConfigFiles) -> ControlResult<PathBuf> {
        let dir = self.snapshot_dir(id)?;
        let result = with_timeout("write snapshot", self.io_timeout, async {
            files::ensure_dir(&dir).await?;
            let writes = Role::ALL.map(|role| {
                let path = Self::snapshot_file(&dir, role);
                async move { files::write_atomic(&path, current.get(role)).await }
            });
            try_join_all(writes).await?;
            Ok::<(), ControlError>(())
        })
        .await;

        if let Err(e) = result {
            tracing::error!(version_id = %id, error = %e, "Snapshot failed, removing partial directory");
            let _ = tokio::fs::remove_dir_all(&dir).await;
            return Err(e);
        }

        tracing::debug!(version_id = %id, dir = %dir.display(), "Snapshot written");
        Ok(dir)
    }

    /// Whether a snapshot directory exists for `id`.
    pub async fn exists(&self, id: &str) -> bool {
        let Ok(dir) = self.snapshot_dir(id) else {
            return false;
        };
        tokio::fs::metadata(dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Read back whichever role files exist for `id`.
    pub async fn restore(&self, id: &str) -> ControlResult<PartialConfigFiles> {
        let dir = self.snapshot_dir(id)?;
        with_timeout("read snapshot", self.io_timeout, async {
            let mut restored = PartialConfigFiles::default();
            for role in Role::ALL {
                let path = Self::snapshot_file(&dir, role);
                if let Some(content) = files::read_text_if_exists(&path).await? {
                    restored.insert(role, content);
                }
            }
            Ok::<_, ControlError>(restored)
        })
        .await
    }

    /// The full version log, oldest first. Corrupt content reads as empty.
    pub async fn read_versions(&self) -> ControlResult<Vec<VersionRecord>> {
        let raw = with_timeout(
            "read version log",
            self.io_timeout,
            files::read_text_or_empty(&self.log_path),
        )
        .await?;

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(path = %self.log_path.display(), error = %e, "Version log unreadable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    pub async fn append_version(&self, record: VersionRecord) -> ControlResult<()> {
        let mut records = self.read_versions().await?;
        records.push(record);

        let mut body = serde_json::to_string_pretty(&records)
            .map_err(|e| ControlError::Serialization(e.to_string()))?;
        body.push('\n');

        with_timeout(
            "write version log",
            self.io_timeout,
            files::write_atomic(&self.log_path, &body),
        )
        .await
    }

    /// Most recent successful version, scanning from the newest record.
    pub async fn last_successful(&self) -> ControlResult<Option<VersionRecord>> {
        Ok(self
            .read_versions()
            .await?
            .into_iter()
            .rev()
            .find(|record| record.success))
    }
}
