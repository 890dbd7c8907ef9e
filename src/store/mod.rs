//! Managed configuration files.
//!
//! # Data Flow
//! ```text
//! load_raw():
//!     read every role from its fixed path ("" when missing)
//!     → ConfigFiles (total, byte-for-byte what is on disk)
//!
//! load():
//!     load_raw()
//!     → ensure scraper rule_files includes the generated rules path (in memory only)
//!
//! save(partial):
//!     for each role present → write temp file → rename over canonical path
//! ```
//!
//! # Design Decisions
//! - Stateless between calls; the filesystem is the only state
//! - Each file is replaced atomically, but a multi-file save is not atomic as a whole
//! - Text is stored verbatim; only the scraper include is ever rewritten on load

pub mod files;
pub mod role;
pub mod simple;

use futures::future::try_join_all;
use serde_yaml::Value;
use std::time::Duration;

use crate::config::PathsConfig;
use crate::error::ControlResult;
use crate::resilience::timeouts::with_timeout;
use crate::yaml;

pub use role::{ChangedRoles, ConfigFiles, PartialConfigFiles, Role};
pub use simple::{SimpleConfig, SimpleOverrides};

/// Reads and writes the managed files.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    paths: PathsConfig,
    io_timeout: Duration,
}

impl ConfigStore {
    pub fn new(paths: PathsConfig, io_timeout: Duration) -> Self {
        Self { paths, io_timeout }
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    /// Load every role with the scraper normalized to include the generated rules.
    pub async fn load(&self) -> ControlResult<ConfigFiles> {
        let raw = self.load_raw().await?;
        Ok(self.normalized(&raw))
    }

    /// Load every role exactly as stored. Missing files are empty; other I/O
    /// errors propagate.
    pub async fn load_raw(&self) -> ControlResult<ConfigFiles> {
        let reads = Role::ALL.map(|role| {
            let path = self.paths.role_path(role);
            async move {
                let content = with_timeout(
                    &format!("read {}", role),
                    self.io_timeout,
                    files::read_text_or_empty(&path),
                )
                .await?;
                Ok::<_, crate::error::ControlError>((role, content))
            }
        });

        let mut loaded = ConfigFiles::default();
        for (role, content) in try_join_all(reads).await? {
            loaded.set(role, content);
        }
        Ok(loaded)
    }

    /// The in-memory view of `raw`: the scraper gains the generated rules include.
    pub fn normalized(&self, raw: &ConfigFiles) -> ConfigFiles {
        let mut files = raw.clone();
        files.scraper =
            ensure_generated_rules_included(&raw.scraper, &self.paths.generated_rules_include);
        files
    }

    /// Write only the roles present in `partial`.
    pub async fn save(&self, partial: &PartialConfigFiles) -> ControlResult<()> {
        let writes = partial.iter().map(|(role, content)| {
            let path = self.paths.role_path(role);
            async move {
                with_timeout(
                    &format!("write {}", role),
                    self.io_timeout,
                    files::write_atomic(&path, content),
                )
                .await
            }
        });
        try_join_all(writes).await?;

        tracing::debug!(
            roles = ?partial.iter().map(|(role, _)| role.as_str()).collect::<Vec<_>>(),
            "Configuration files written"
        );
        Ok(())
    }

    /// Read a single role verbatim from disk.
    pub async fn read_role(&self, role: Role) -> ControlResult<String> {
        let path = self.paths.role_path(role);
        with_timeout(
            &format!("read {}", role),
            self.io_timeout,
            files::read_text_or_empty(&path),
        )
        .await
    }
}

/// Make sure the scraper config lists the generated rules file.
///
/// Text that already references it, or that does not parse as a mapping, is
/// returned unchanged.
pub fn ensure_generated_rules_included(scraper_raw: &str, include: &str) -> String {
    let Ok(mut doc) = yaml::parse_document(scraper_raw) else {
        return scraper_raw.to_string();
    };

    if yaml::strings_at(&doc, &["rule_files"]).iter().any(|f| f == include) {
        return scraper_raw.to_string();
    }

    let Some(map) = doc.as_mapping_mut() else {
        return scraper_raw.to_string();
    };
    let key = Value::from("rule_files");
    match map.get_mut(&key) {
        Some(Value::Sequence(files)) => files.push(Value::from(include)),
        _ => {
            map.insert(key, Value::Sequence(vec![Value::from(include)]));
        }
    }

    yaml::dump(&doc).unwrap_or_else(|_| scraper_raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INCLUDE: &str = "/etc/prometheus/rules/faultline-generated-alerts.yml";

    #[test]
    fn test_include_added_when_missing() {
        let raw = "rule_files:\n  - /etc/prometheus/rules/faultline-alerts.yml\n";
        let fixed = ensure_generated_rules_included(raw, INCLUDE);
        let doc = yaml::parse_document(&fixed).unwrap();
        assert_eq!(
            yaml::strings_at(&doc, &["rule_files"]),
            vec!["/etc/prometheus/rules/faultline-alerts.yml", INCLUDE]
        );
    }

    #[test]
    fn test_present_include_keeps_text_verbatim() {
        let raw = format!("# hand written\nrule_files:   [ {} ]\n", INCLUDE);
        assert_eq!(ensure_generated_rules_included(&raw, INCLUDE), raw);
    }

    #[test]
    fn test_empty_scraper_gets_include() {
        let fixed = ensure_generated_rules_included("", INCLUDE);
        let doc = yaml::parse_document(&fixed).unwrap();
        assert_eq!(yaml::strings_at(&doc, &["rule_files"]), vec![INCLUDE]);
    }

    #[tokio::test]
    async fn test_load_raw_keeps_scraper_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathsConfig {
            compose_dir: dir.path().to_path_buf(),
            generated_rules_include: INCLUDE.to_string(),
            ..Default::default()
        };
        let scraper_path = paths.role_path(Role::Scraper);
        std::fs::create_dir_all(scraper_path.parent().unwrap()).unwrap();
        let raw = "global:\n  scrape_interval: 15s   # tuned\n";
        std::fs::write(&scraper_path, raw).unwrap();

        let store = ConfigStore::new(paths, Duration::from_secs(5));
        assert_eq!(store.load_raw().await.unwrap().scraper, raw);
        assert!(store.load().await.unwrap().scraper.contains(INCLUDE));
        assert_eq!(std::fs::read_to_string(&scraper_path).unwrap(), raw);
    }

    #[test]
    fn test_unparsable_scraper_is_untouched() {
        let raw = "scrape_configs: [\n";
        assert_eq!(ensure_generated_rules_included(raw, INCLUDE), raw);
    }
}
