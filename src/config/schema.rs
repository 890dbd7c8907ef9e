//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the control
//! plane. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::store::Role;

/// Root configuration for the control plane.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Where the managed files and the version state live.
    pub paths: PathsConfig,

    /// Container names for each managed service.
    pub services: ServicesConfig,

    /// Reload and health probe URLs.
    pub endpoints: EndpointsConfig,

    /// Per-call deadlines for external effects.
    pub timeouts: TimeoutConfig,

    /// Reload signal retry policy.
    pub reload: ReloadConfig,

    /// Apply transaction behavior.
    pub apply: ApplyConfig,

    /// Hosts and ports the cross-file validator expects.
    pub topology: TopologyConfig,

    /// API server settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Filesystem layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the compose project.
    pub compose_dir: PathBuf,

    /// Directory holding the version log and snapshots.
    pub state_dir: PathBuf,

    pub compose_file: PathBuf,
    pub scraper_file: PathBuf,
    pub collector_file: PathBuf,
    pub trace_backend_file: PathBuf,
    pub log_backend_file: PathBuf,
    pub alert_rules_file: PathBuf,
    pub generated_alert_rules_file: PathBuf,

    /// Path of the generated rules file as seen from inside the scraper container.
    pub generated_rules_include: String,
}

impl PathsConfig {
    /// Absolute path of a role's file.
    pub fn role_path(&self, role: Role) -> PathBuf {
        let relative = match role {
            Role::Compose => &self.compose_file,
            Role::Scraper => &self.scraper_file,
            Role::Collector => &self.collector_file,
            Role::TraceBackend => &self.trace_backend_file,
            Role::LogBackend => &self.log_backend_file,
            Role::AlertRules => &self.alert_rules_file,
            Role::GeneratedAlertRules => &self.generated_alert_rules_file,
        };
        self.compose_dir.join(relative)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.state_dir.join("versions")
    }

    pub fn versions_log(&self) -> PathBuf {
        self.state_dir.join("versions.json")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            compose_dir: PathBuf::from("/workspace/compose"),
            state_dir: PathBuf::from("/var/lib/faultline"),
            compose_file: PathBuf::from("docker-compose.yml"),
            scraper_file: PathBuf::from("prometheus/prometheus.yml"),
            collector_file: PathBuf::from("otel/collector.yaml"),
            trace_backend_file: PathBuf::from("tempo/config.yml"),
            log_backend_file: PathBuf::from("loki/config.yml"),
            alert_rules_file: PathBuf::from("prometheus/rules/faultline-alerts.yml"),
            generated_alert_rules_file: PathBuf::from(
                "prometheus/rules/faultline-generated-alerts.yml",
            ),
            generated_rules_include: "/etc/prometheus/rules/faultline-generated-alerts.yml"
                .to_string(),
        }
    }
}

/// Container names.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub scraper: String,
    pub collector: String,
    pub trace_backend: String,
    pub log_backend: String,

    /// Every container restarted during recovery.
    pub managed: Vec<String>,

    /// Containers whose running state drives the read-only profile toggles.
    pub db_profile_container: String,
    pub host_profile_container: String,

    /// Whether restarts go through the container runtime at all.
    pub docker_control_enabled: bool,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            scraper: "prometheus".to_string(),
            collector: "otel-collector".to_string(),
            trace_backend: "tempo".to_string(),
            log_backend: "loki".to_string(),
            managed: ["otel-collector", "prometheus", "loki", "tempo", "grafana"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            db_profile_container: "postgres".to_string(),
            host_profile_container: "node-exporter".to_string(),
            docker_control_enabled: true,
        }
    }
}

/// A named health probe.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProbeConfig {
    pub name: String,
    pub url: String,
}

impl ProbeConfig {
    pub fn new(name: &str, url: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            url: url.into(),
        }
    }
}

/// Downstream HTTP endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub prometheus_url: String,
    pub loki_url: String,
    pub tempo_url: String,
    pub grafana_url: String,
    pub collector_metrics_url: String,

    /// Explicit probe list. When empty, probes are derived from the URLs above.
    pub probes: Vec<ProbeConfig>,
}

impl EndpointsConfig {
    /// URL of the scraper's reload endpoint.
    pub fn reload_url(&self) -> String {
        format!("{}/-/reload", self.prometheus_url.trim_end_matches('/'))
    }

    /// Probes run after every apply and rollback.
    pub fn health_probes(&self) -> Vec<ProbeConfig> {
        if !self.probes.is_empty() {
            return self.probes.clone();
        }
        let base = |url: &str| url.trim_end_matches('/').to_string();
        vec![
            ProbeConfig::new("grafana", format!("{}/api/health", base(&self.grafana_url))),
            ProbeConfig::new("prometheus", format!("{}/-/ready", base(&self.prometheus_url))),
            ProbeConfig::new("loki", format!("{}/ready", base(&self.loki_url))),
            ProbeConfig::new("tempo", format!("{}/status", base(&self.tempo_url))),
            ProbeConfig::new("otel-collector", self.collector_metrics_url.clone()),
        ]
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            prometheus_url: "http://prometheus:9090".to_string(),
            loki_url: "http://loki:3100".to_string(),
            tempo_url: "http://tempo:3200".to_string(),
            grafana_url: "http://grafana:3000".to_string(),
            collector_metrics_url: "http://otel-collector:8888/metrics".to_string(),
            probes: Vec::new(),
        }
    }
}

/// Timeout configuration for external effects, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// File reads and writes.
    pub file_io_secs: u64,

    /// One container restart.
    pub restart_secs: u64,

    /// One reload call.
    pub reload_secs: u64,

    /// One health probe.
    pub probe_secs: u64,
}

impl TimeoutConfig {
    pub fn file_io(&self) -> Duration {
        Duration::from_secs(self.file_io_secs)
    }

    pub fn restart(&self) -> Duration {
        Duration::from_secs(self.restart_secs)
    }

    pub fn reload(&self) -> Duration {
        Duration::from_secs(self.reload_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            file_io_secs: 10,
            restart_secs: 60,
            reload_secs: 10,
            probe_secs: 5,
        }
    }
}

/// Reload retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Maximum number of reload attempts.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4000,
        }
    }
}

/// Apply transaction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// When false, failed restarts are logged and ignored instead of failing the apply.
    pub restart_failures_fatal: bool,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            restart_failures_fatal: true,
        }
    }
}

/// Service topology the validator checks the documents against.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TopologyConfig {
    /// Host the scraper uses to reach the collector.
    pub collector_host: String,

    /// Port of the collector's Prometheus exporter, if the collector config does not set one.
    pub collector_metrics_port: u16,

    /// Name of the collector exporter that ships traces.
    pub trace_exporter: String,

    /// Host of the trace backend service.
    pub trace_backend_host: String,

    /// Fixed OTLP-HTTP port.
    pub otlp_http_port: u16,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            collector_host: "otel-collector".to_string(),
            collector_metrics_port: 8889,
            trace_exporter: "otlphttp/tempo".to_string(),
            trace_backend_host: "tempo".to_string(),
            otlp_http_port: 4318,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Request timeout for read-only endpoints in seconds.
    pub request_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            max_body_size: 5 * 1024 * 1024, // 5MB
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9464".to_string(),
        }
    }
}
