//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::ControlPlaneConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: TOML file (if given), then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ControlPlaneConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ControlPlaneConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay the deployment environment variables onto a config.
pub fn apply_env_overrides<F>(config: &mut ControlPlaneConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env("FAULTLINE_COMPOSE_DIR") {
        config.paths.compose_dir = PathBuf::from(dir);
    }
    if let Some(dir) = env("FAULTLINE_STATE_DIR") {
        config.paths.state_dir = PathBuf::from(dir);
    }
    if let Some(url) = env("PROMETHEUS_URL") {
        config.endpoints.prometheus_url = url;
    }
    if let Some(url) = env("LOKI_URL") {
        config.endpoints.loki_url = url;
    }
    if let Some(url) = env("TEMPO_URL") {
        config.endpoints.tempo_url = url;
    }
    if let Some(url) = env("GRAFANA_URL") {
        config.endpoints.grafana_url = url;
    }
    if let Some(url) = env("COLLECTOR_METRICS_URL") {
        config.endpoints.collector_metrics_url = url;
    }
    if let Some(flag) = env("ENABLE_DOCKER_CONTROL") {
        config.services.docker_control_enabled = flag != "false";
    }
    if let Some(port) = env("PORT") {
        match port.parse::<u16>() {
            Ok(port) => config.server.bind_address = format!("0.0.0.0:{}", port),
            Err(_) => tracing::warn!(port = %port, "Ignoring invalid PORT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FAULTLINE_STATE_DIR", "/data/state"),
            ("PROMETHEUS_URL", "http://localhost:9090"),
            ("ENABLE_DOCKER_CONTROL", "false"),
            ("PORT", "4000"),
        ]
        .into_iter()
        .collect();

        let mut config = ControlPlaneConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.paths.state_dir, PathBuf::from("/data/state"));
        assert_eq!(config.endpoints.reload_url(), "http://localhost:9090/-/reload");
        assert!(!config.services.docker_control_enabled);
        assert_eq!(config.server.bind_address, "0.0.0.0:4000");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faultline.toml");
        fs::write(&path, "[timeouts]\nprobe_secs = 0\n").unwrap();

        match load_config(Some(&path)) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.field == "timeouts.probe_secs"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
