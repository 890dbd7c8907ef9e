//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of the control plane's own settings (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//! - Check that every per-role container is in the managed set
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControlPlaneConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::ControlPlaneConfig;

/// A single semantic problem with the control plane configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ControlPlaneConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let timeouts = [
        ("timeouts.file_io_secs", config.timeouts.file_io_secs),
        ("timeouts.restart_secs", config.timeouts.restart_secs),
        ("timeouts.reload_secs", config.timeouts.reload_secs),
        ("timeouts.probe_secs", config.timeouts.probe_secs),
    ];
    for (field, secs) in timeouts {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.reload.max_attempts == 0 {
        errors.push(ValidationError::new("reload.max_attempts", "must be at least 1"));
    }
    if config.reload.base_delay_ms > config.reload.max_delay_ms {
        errors.push(ValidationError::new(
            "reload.base_delay_ms",
            "must not exceed reload.max_delay_ms",
        ));
    }

    let services = &config.services;
    for (field, name) in [
        ("services.scraper", &services.scraper),
        ("services.collector", &services.collector),
        ("services.trace_backend", &services.trace_backend),
        ("services.log_backend", &services.log_backend),
    ] {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        } else if !services.managed.contains(name) {
            errors.push(ValidationError::new(
                field,
                format!("container '{}' is not in services.managed", name),
            ));
        }
    }

    for probe in config.endpoints.health_probes() {
        if !(probe.url.starts_with("http://") || probe.url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "endpoints.probes",
                format!("probe '{}' has non-HTTP url '{}'", probe.name, probe.url),
            ));
        }
    }

    if config.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            "must be 'pretty' or 'json'",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ControlPlaneConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ControlPlaneConfig::default();
        config.timeouts.restart_secs = 0;
        config.reload.max_attempts = 0;
        config.services.log_backend = "loki-2".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "timeouts.restart_secs",
                "reload.max_attempts",
                "services.log_backend"
            ]
        );
    }
}
