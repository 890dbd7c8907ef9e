//! Alert rule templates and the generated rules file.
//!
//! Rules are built from a small set of templates and merged into a single
//! group in the generated rules file. Committing the merged file is the
//! caller's job; it goes through the apply transaction like any other change.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ControlError, ControlResult};

/// Group that holds every generated rule.
pub const GENERATED_GROUP: &str = "faultline.generated";

const DEFAULT_DURATION: &str = "5m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTemplate {
    ServiceDown,
    HighErrorRate,
    HighLatencyP95,
    HighCpu,
    HighMemory,
}

impl AlertTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTemplate::ServiceDown => "service_down",
            AlertTemplate::HighErrorRate => "high_error_rate",
            AlertTemplate::HighLatencyP95 => "high_latency_p95",
            AlertTemplate::HighCpu => "high_cpu",
            AlertTemplate::HighMemory => "high_memory",
        }
    }

    fn default_threshold(&self) -> f64 {
        match self {
            AlertTemplate::ServiceDown => 0.0,
            AlertTemplate::HighErrorRate => 0.05,
            AlertTemplate::HighLatencyP95 => 1.0,
            AlertTemplate::HighCpu => 0.8,
            AlertTemplate::HighMemory => 536_870_912.0,
        }
    }
}

impl fmt::Display for AlertTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAlertRequest {
    pub template: AlertTemplate,
    pub service: String,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// One Prometheus rule. Fields this crate does not model are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(default)]
    pub expr: String,
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_duration: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Parse a rules file. Blank or `null` text is an empty file.
pub fn parse_rule_file(raw: &str, file: &str) -> ControlResult<RuleFile> {
    if raw.trim().is_empty() {
        return Ok(RuleFile::default());
    }
    serde_yaml::from_str::<Option<RuleFile>>(raw)
        .map(Option::unwrap_or_default)
        .map_err(|e| ControlError::Parse {
            file: file.to_string(),
            message: e.to_string(),
        })
}

pub fn dump_rule_file(rules: &RuleFile) -> ControlResult<String> {
    serde_yaml::to_string(rules).map_err(|e| ControlError::Serialization(e.to_string()))
}

/// Lowercase, with every run of non-alphanumerics collapsed to `_` and
/// leading or trailing underscores removed.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Build a rule from a template.
pub fn build_rule(input: &CreateAlertRequest) -> ControlResult<Rule> {
    let service = input.service.trim();
    if service.is_empty() {
        return Err(ControlError::InvalidRuleInput("service is required".into()));
    }
    let name = sanitize(service);
    if name.is_empty() {
        return Err(ControlError::InvalidRuleInput(format!(
            "service name {:?} has no usable characters",
            service
        )));
    }

    let template = input.template;
    let threshold = input
        .threshold
        .unwrap_or_else(|| template.default_threshold());
    if !threshold.is_finite() {
        return Err(ControlError::InvalidRuleInput("threshold must be a finite number".into()));
    }
    let duration = input
        .duration
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DURATION);

    let (expr, severity, summary, description) = match template {
        AlertTemplate::ServiceDown => (
            format!(r#"up{{service="{}"}} == 0"#, service),
            "critical",
            format!("{} is down", service),
            format!("{} has been unreachable for {}", service, duration),
        ),
        AlertTemplate::HighErrorRate => (
            format!(
                r#"sum(rate(http_requests_total{{service="{s}",status_code=~"5..|4.."}}[5m])) / sum(rate(http_requests_total{{service="{s}"}}[5m])) > {t}"#,
                s = service,
                t = threshold
            ),
            "warning",
            format!("High error rate for {}", service),
            format!("Error ratio exceeded {} for {}", threshold, duration),
        ),
        AlertTemplate::HighLatencyP95 => (
            format!(
                r#"histogram_quantile(0.95, sum(rate(http_request_duration_seconds_bucket{{service="{}"}}[5m])) by (le)) > {}"#,
                service, threshold
            ),
            "warning",
            format!("High latency for {}", service),
            format!("P95 latency exceeded {}s for {}", threshold, duration),
        ),
        AlertTemplate::HighCpu => (
            format!(
                r#"sum(rate(process_cpu_seconds_total{{service="{}"}}[5m])) > {}"#,
                service, threshold
            ),
            "warning",
            format!("High CPU usage for {}", service),
            format!("CPU usage exceeded {} cores for {}", threshold, duration),
        ),
        AlertTemplate::HighMemory => (
            format!(
                r#"sum(process_resident_memory_bytes{{service="{}"}}) > {}"#,
                service, threshold
            ),
            "warning",
            format!("High memory usage for {}", service),
            format!("Resident memory exceeded {} bytes for {}", threshold, duration),
        ),
    };

    Ok(Rule {
        alert: Some(format!("{}_{}", name, template)),
        expr,
        for_duration: Some(duration.to_string()),
        labels: BTreeMap::from([("severity".to_string(), severity.to_string())]),
        annotations: BTreeMap::from([
            ("summary".to_string(), summary),
            ("description".to_string(), description),
        ]),
        extra: BTreeMap::new(),
    })
}

/// Merge `rule` into the generated group of `raw`. A rule with the same
/// alert name is replaced in place; otherwise the rule is appended.
pub fn merge_generated_rule(raw: &str, rule: Rule) -> ControlResult<String> {
    let mut file = parse_rule_file(raw, "generated alert rules")?;

    let group = match file.groups.iter().position(|g| g.name == GENERATED_GROUP) {
        Some(index) => &mut file.groups[index],
        None => {
            file.groups.push(RuleGroup {
                name: GENERATED_GROUP.to_string(),
                ..Default::default()
            });
            let last = file.groups.len() - 1;
            &mut file.groups[last]
        }
    };

    match group
        .rules
        .iter_mut()
        .find(|existing| existing.alert.is_some() && existing.alert == rule.alert)
    {
        Some(existing) => *existing = rule,
        None => group.rules.push(rule),
    }

    dump_rule_file(&file)
}
