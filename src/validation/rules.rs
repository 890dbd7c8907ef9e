//! Cross-file consistency rules.
//!
//! Each rule looks at the parsed documents and contributes at most one error.

use serde_yaml::Value;

use crate::config::TopologyConfig;
use crate::yaml;

/// The three parsed documents the rules inspect.
#[derive(Debug, Clone)]
pub struct ParsedDocuments {
    pub scraper: Value,
    pub collector: Value,
    pub trace_backend: Value,
}

/// A rule: `None` when satisfied, `Some(message)` when violated.
pub type Rule = fn(&ParsedDocuments, &TopologyConfig) -> Option<String>;

/// Every rule, in reporting order.
pub const RULES: &[Rule] = &[
    scraper_scrapes_collector_exporter,
    trace_exporter_targets_backend,
    trace_exporter_uses_otlp_http_port,
    trace_receiver_binds_all_interfaces,
];

const METRICS_EXPORTER: &str = "prometheus";

/// Address the scraper must use to reach the collector's Prometheus exporter.
pub fn collector_exporter_address(collector: &Value, topology: &TopologyConfig) -> String {
    let port = yaml::string_at(collector, &["exporters", METRICS_EXPORTER, "endpoint"])
        .and_then(|endpoint| split_endpoint(endpoint).1)
        .and_then(|port| port.parse::<u16>().ok())
        .unwrap_or(topology.collector_metrics_port);
    format!("{}:{}", topology.collector_host, port)
}

pub fn scraper_scrapes_collector_exporter(
    docs: &ParsedDocuments,
    topology: &TopologyConfig,
) -> Option<String> {
    let pipeline_enabled = yaml::metrics_pipeline_exporters(&docs.collector)
        .iter()
        .any(|e| e == METRICS_EXPORTER);
    if !pipeline_enabled {
        return None;
    }

    let address = collector_exporter_address(&docs.collector, topology);
    if yaml::static_targets(&docs.scraper).contains(&address) {
        return None;
    }
    Some(format!(
        "prometheus.yml must scrape the collector's metrics exporter at {} when the collector metrics pipeline is enabled",
        address
    ))
}

pub fn trace_exporter_targets_backend(
    docs: &ParsedDocuments,
    topology: &TopologyConfig,
) -> Option<String> {
    let endpoint = trace_exporter_endpoint(docs, topology);
    let (host, _) = split_endpoint(endpoint);
    if host == topology.trace_backend_host {
        return None;
    }
    Some(format!(
        "collector trace exporter endpoint must target {} service",
        topology.trace_backend_host
    ))
}

pub fn trace_exporter_uses_otlp_http_port(
    docs: &ParsedDocuments,
    topology: &TopologyConfig,
) -> Option<String> {
    let endpoint = trace_exporter_endpoint(docs, topology);
    let expected = topology.otlp_http_port.to_string();
    if split_endpoint(endpoint).1 == Some(expected.as_str()) {
        return None;
    }
    Some(format!(
        "collector trace exporter endpoint must use OTLP HTTP port {}",
        topology.otlp_http_port
    ))
}

pub fn trace_receiver_binds_all_interfaces(
    docs: &ParsedDocuments,
    topology: &TopologyConfig,
) -> Option<String> {
    let receiver = yaml::string_at(
        &docs.trace_backend,
        &["distributor", "receivers", "otlp", "protocols", "http", "endpoint"],
    )
    .unwrap_or_default();
    let expected = format!("0.0.0.0:{}", topology.otlp_http_port);
    if receiver == expected {
        return None;
    }
    Some(format!("tempo OTLP HTTP receiver must be enabled on {}", expected))
}

fn trace_exporter_endpoint<'a>(docs: &'a ParsedDocuments, topology: &TopologyConfig) -> &'a str {
    docs.collector
        .get("exporters")
        .and_then(|exporters| exporters.get(topology.trace_exporter.as_str()))
        .and_then(|exporter| exporter.get("endpoint"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// Split `scheme://host:port/path` into host and port.
pub fn split_endpoint(endpoint: &str) -> (&str, Option<&str>) {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    let authority = without_scheme
        .split_once('/')
        .map(|(authority, _)| authority)
        .unwrap_or(without_scheme);
    match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    }
}
