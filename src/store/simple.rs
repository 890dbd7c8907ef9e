//! The structured "simple" view over the managed files.
//!
//! A handful of knobs (retention, extra scrape targets, the collector's
//! metrics pipeline) are exposed as typed fields and rewritten into the
//! underlying YAML. Profile toggles reflect which optional containers are
//! running and are read-only.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{ControlError, ControlResult};
use crate::store::{ensure_generated_rules_included, ConfigFiles};
use crate::yaml;

const RETENTION_FLAG: &str = "--storage.tsdb.retention.time=";
const DEFAULT_RETENTION: &str = "200h";
const METRICS_EXPORTER: &str = "prometheus";

/// Targets scraped by the stock stack; anything else is a user addition.
const BUILTIN_TARGETS: [&str; 7] = [
    "localhost:9090",
    "otel-collector:8888",
    "otel-collector:8889",
    "node-exporter:9100",
    "postgres-exporter:9187",
    "redis-exporter:9121",
    "host.docker.internal:3001",
];

/// Current structured settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleConfig {
    pub enable_db_profile: bool,
    pub enable_host_profile: bool,
    /// Extra scrape targets, comma separated.
    pub add_scrape_target: String,
    pub prometheus_retention: String,
    pub metrics_pipeline_enabled: bool,
}

/// Requested structured changes. Unset fields leave the files alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimpleOverrides {
    pub enable_db_profile: Option<bool>,
    pub enable_host_profile: Option<bool>,
    pub add_scrape_target: Option<String>,
    pub prometheus_retention: Option<String>,
    pub metrics_pipeline_enabled: Option<bool>,
}

/// Derive the structured view from the file set and container states.
pub fn describe(files: &ConfigFiles, db_running: bool, host_running: bool) -> SimpleConfig {
    let extra_targets = yaml::parse_document(&files.scraper)
        .map(|doc| user_targets(&doc))
        .unwrap_or_default();

    let metrics_pipeline_enabled = yaml::parse_document(&files.collector)
        .map(|doc| {
            yaml::metrics_pipeline_exporters(&doc)
                .iter()
                .any(|e| e == METRICS_EXPORTER)
        })
        .unwrap_or(false);

    SimpleConfig {
        enable_db_profile: db_running,
        enable_host_profile: host_running,
        add_scrape_target: extra_targets.join(", "),
        prometheus_retention: retention_from_compose(&files.compose)
            .unwrap_or_else(|| DEFAULT_RETENTION.to_string()),
        metrics_pipeline_enabled,
    }
}

/// Apply structured overrides, returning the rewritten file set.
///
/// `scraper_service` is the compose service key whose command carries the
/// retention flag.
pub fn apply_overrides(
    files: &ConfigFiles,
    overrides: &SimpleOverrides,
    scraper_service: &str,
    generated_rules_include: &str,
) -> ControlResult<ConfigFiles> {
    let mut next = files.clone();

    if let Some(retention) = overrides
        .prometheus_retention
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
    {
        next.compose = apply_retention(&next.compose, scraper_service, retention)?;
    }

    if let Some(targets) = overrides.add_scrape_target.as_deref() {
        for target in targets.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            next.scraper = add_scrape_target(&next.scraper, target)?;
        }
    }

    if let Some(enabled) = overrides.metrics_pipeline_enabled {
        next.collector = set_metrics_pipeline(&next.collector, enabled)?;
    }

    next.scraper = ensure_generated_rules_included(&next.scraper, generated_rules_include);
    Ok(next)
}

fn retention_from_compose(compose: &str) -> Option<String> {
    let start = compose.find(RETENTION_FLAG)? + RETENTION_FLAG.len();
    let value: String = compose[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '\'' | '"' | ']' | ','))
        .collect();
    (!value.is_empty()).then_some(value)
}

fn apply_retention(compose: &str, service: &str, retention: &str) -> ControlResult<String> {
    let mut doc = yaml::parse_named(compose, "docker-compose.yml")?;
    let Some(scraper) = doc
        .get_mut("services")
        .and_then(|services| services.get_mut(service))
        .and_then(Value::as_mapping_mut)
    else {
        // No scraper service in this compose file; nothing to rewrite.
        return Ok(compose.to_string());
    };

    let mut command: Vec<Value> = match scraper.get("command") {
        Some(Value::Sequence(items)) => items.clone(),
        Some(Value::String(line)) => line.split_whitespace().map(Value::from).collect(),
        _ => Vec::new(),
    };
    command.retain(|entry| {
        !entry
            .as_str()
            .is_some_and(|flag| flag.starts_with(RETENTION_FLAG))
    });
    command.push(Value::from(format!("{}{}", RETENTION_FLAG, retention)));
    scraper.insert(Value::from("command"), Value::Sequence(command));

    yaml::dump(&doc)
}

fn add_scrape_target(scraper: &str, target: &str) -> ControlResult<String> {
    let mut doc = yaml::parse_named(scraper, "prometheus.yml")?;
    if yaml::static_targets(&doc).iter().any(|t| t == target) {
        return Ok(scraper.to_string());
    }

    let Some(root) = doc.as_mapping_mut() else {
        return Err(parse_error("prometheus.yml", "document is not a mapping"));
    };
    let key = Value::from("scrape_configs");
    if !matches!(root.get(&key), Some(Value::Sequence(_))) {
        root.insert(key.clone(), Value::Sequence(Vec::new()));
    }
    if let Some(Value::Sequence(jobs)) = root.get_mut(&key) {
        jobs.push(scrape_job(target));
    }

    yaml::dump(&doc)
}

fn scrape_job(target: &str) -> Value {
    let mut static_config = Mapping::new();
    static_config.insert(
        Value::from("targets"),
        Value::Sequence(vec![Value::from(target)]),
    );

    let mut job = Mapping::new();
    job.insert(
        Value::from("job_name"),
        Value::from(format!("custom-{}", slug(target))),
    );
    job.insert(
        Value::from("static_configs"),
        Value::Sequence(vec![Value::Mapping(static_config)]),
    );
    job.insert(Value::from("scrape_interval"), Value::from("15s"));
    job.insert(Value::from("scrape_timeout"), Value::from("10s"));
    Value::Mapping(job)
}

/// Collapse every run of non-alphanumeric characters into a single '-'.
fn slug(target: &str) -> String {
    let mut out = String::with_capacity(target.len());
    let mut in_gap = false;
    for c in target.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            in_gap = false;
        } else if !in_gap {
            out.push('-');
            in_gap = true;
        }
    }
    out
}

fn set_metrics_pipeline(collector: &str, enabled: bool) -> ControlResult<String> {
    let mut doc = yaml::parse_named(collector, "collector.yaml")?;
    let current = yaml::metrics_pipeline_exporters(&doc)
        .iter()
        .any(|e| e == METRICS_EXPORTER);
    if current == enabled {
        return Ok(collector.to_string());
    }

    let Some(pipeline) = yaml::lookup_or_insert(&mut doc, &["service", "pipelines", "metrics"])
        .and_then(Value::as_mapping_mut)
    else {
        return Err(parse_error("collector.yaml", "service.pipelines.metrics is not a mapping"));
    };

    let key = Value::from("exporters");
    let mut exporters = match pipeline.get(&key) {
        Some(Value::Sequence(items)) => items.clone(),
        _ => Vec::new(),
    };
    if enabled {
        exporters.push(Value::from(METRICS_EXPORTER));
    } else {
        exporters.retain(|e| e.as_str() != Some(METRICS_EXPORTER));
    }
    pipeline.insert(key, Value::Sequence(exporters));

    yaml::dump(&doc)
}

fn user_targets(scraper: &Value) -> Vec<String> {
    let mut targets: Vec<String> = yaml::static_targets(scraper)
        .into_iter()
        .filter(|t| !BUILTIN_TARGETS.contains(&t.as_str()))
        .collect();
    targets.sort();
    targets.dedup();
    targets
}

fn parse_error(file: &str, message: &str) -> ControlError {
    ControlError::Parse {
        file: file.to_string(),
        message: message.to_string(),
    }
}
