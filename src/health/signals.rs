//! Telemetry signals for the status view.
//!
//! # Responsibilities
//! - Ask the scraper, trace backend and log backend when they last saw data
//! - Count firing alerts
//! - List the scraper's active targets
//!
//! Signal queries are best effort: a failed, slow or malformed answer reads
//! as "no data". They never affect the transaction's health verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time;

use crate::config::EndpointsConfig;
use crate::error::{ControlError, ControlResult};
use crate::health::HealthSummary;
use crate::resilience::timeouts::with_timeout;

const ALERTS_FIRING_QUERY: &str = r#"sum(ALERTS{alertstate="firing"})"#;
const LAST_UP_QUERY: &str = "max(timestamp(up == 1))";
const ANY_LOG_QUERY: &str = r#"{job=~".+"}"#;
const TARGETS_CALL: &str = "prometheus targets";

/// When each signal type was last observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSeen {
    pub metrics: Option<DateTime<Utc>>,
    pub traces: Option<DateTime<Utc>>,
    pub logs: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySignals {
    pub last_seen: LastSeen,
    pub alerts_firing: u64,
    /// 1 when any scrape target has reported up, otherwise 0.
    pub targets_up: u32,
}

/// Everything `GET /api/status` reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackStatus {
    #[serde(flatten)]
    pub health: HealthSummary,
    #[serde(flatten)]
    pub signals: TelemetrySignals,
}

/// One active scrape target as the scraper reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeTarget {
    pub job: String,
    pub instance: String,
    pub health: String,
    pub last_error: String,
}

/// Queries the stack's own APIs for freshness and alert signals.
pub struct SignalReader {
    client: reqwest::Client,
    prometheus_url: String,
    tempo_url: String,
    loki_url: String,
    timeout: Duration,
}

impl SignalReader {
    pub fn new(client: reqwest::Client, endpoints: &EndpointsConfig, timeout: Duration) -> Self {
        let base = |url: &str| url.trim_end_matches('/').to_string();
        Self {
            client,
            prometheus_url: base(&endpoints.prometheus_url),
            tempo_url: base(&endpoints.tempo_url),
            loki_url: base(&endpoints.loki_url),
            timeout,
        }
    }

    pub async fn collect(&self) -> TelemetrySignals {
        let (alerts_firing, last_up, traces, logs) = tokio::join!(
            self.prometheus_instant(ALERTS_FIRING_QUERY),
            self.prometheus_instant(LAST_UP_QUERY),
            self.last_trace(),
            self.last_log(),
        );

        let metrics = last_up.and_then(from_epoch_secs);
        TelemetrySignals {
            targets_up: u32::from(metrics.is_some()),
            last_seen: LastSeen {
                metrics,
                traces,
                logs,
            },
            alerts_firing: alerts_firing
                .filter(|count| count.is_finite() && *count > 0.0)
                .map(|count| count as u64)
                .unwrap_or(0),
        }
    }

    /// Active targets from the scraper. Unlike the signals, failures here are errors.
    pub async fn targets(&self) -> ControlResult<Vec<ScrapeTarget>> {
        let url = format!("{}/api/v1/targets", self.prometheus_url);
        with_timeout(TARGETS_CALL, self.timeout, async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| ControlError::external(TARGETS_CALL, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ControlError::external(
                    TARGETS_CALL,
                    format!("prometheus returned {}", status.as_u16()),
                ));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| ControlError::external(TARGETS_CALL, e.to_string()))?;
            Ok(parse_targets(&body))
        })
        .await
    }

    async fn prometheus_instant(&self, query: &str) -> Option<f64> {
        let url = format!("{}/api/v1/query", self.prometheus_url);
        let body = self.get_json(&url, &[("query", query)]).await?;
        body.pointer("/data/result/0/value/1")
            .and_then(Value::as_str)
            .and_then(|value| value.parse().ok())
    }

    async fn last_trace(&self) -> Option<DateTime<Utc>> {
        let url = format!("{}/api/search", self.tempo_url);
        let body = self.get_json(&url, &[("limit", "1")]).await?;
        body.pointer("/traces/0/startTimeUnixNano")
            .and_then(Value::as_str)
            .and_then(from_epoch_nanos)
    }

    async fn last_log(&self) -> Option<DateTime<Utc>> {
        let url = format!("{}/loki/api/v1/query", self.loki_url);
        let body = self
            .get_json(&url, &[("query", ANY_LOG_QUERY), ("limit", "1")])
            .await?;
        body.pointer("/data/result/0/values/0/0")
            .and_then(Value::as_str)
            .and_then(from_epoch_nanos)
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Option<Value> {
        let fetch = async {
            let response = self.client.get(url).query(query).send().await?;
            response.error_for_status()?.json::<Value>().await
        };

        match time::timeout(self.timeout, fetch).await {
            Ok(Ok(body)) => Some(body),
            Ok(Err(e)) => {
                tracing::debug!(url = %url, error = %e, "Signal query failed");
                None
            }
            Err(_) => {
                tracing::debug!(url = %url, "Signal query timed out");
                None
            }
        }
    }
}

fn parse_targets(body: &Value) -> Vec<ScrapeTarget> {
    let field = |target: &Value, pointer: &str, default: &str| {
        target
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };

    body.pointer("/data/activeTargets")
        .and_then(Value::as_array)
        .map(|targets| {
            targets
                .iter()
                .map(|target| ScrapeTarget {
                    job: field(target, "/labels/job", "unknown"),
                    instance: field(target, "/labels/instance", "unknown"),
                    health: field(target, "/health", "unknown"),
                    last_error: field(target, "/lastError", ""),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0) as i64)
}

fn from_epoch_nanos(raw: &str) -> Option<DateTime<Utc>> {
    let nanos: i64 = raw.parse().ok()?;
    (nanos > 0).then(|| DateTime::from_timestamp_nanos(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_epoch_conversions() {
        assert_eq!(
            from_epoch_secs(1_700_000_000.5),
            DateTime::from_timestamp_millis(1_700_000_000_500)
        );
        assert_eq!(from_epoch_secs(0.0), None);
        assert_eq!(from_epoch_secs(f64::NAN), None);

        assert_eq!(
            from_epoch_nanos("1700000001000000000"),
            DateTime::from_timestamp(1_700_000_001, 0)
        );
        assert_eq!(from_epoch_nanos("soon"), None);
    }

    #[test]
    fn test_targets_default_missing_fields() {
        let body = json!({
            "data": {
                "activeTargets": [
                    {
                        "labels": { "job": "otel-collector-exporter", "instance": "otel-collector:8889" },
                        "health": "up",
                        "lastError": ""
                    },
                    { "health": "down", "lastError": "connection refused" }
                ]
            }
        });

        let targets = parse_targets(&body);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].instance, "otel-collector:8889");
        assert_eq!(targets[1].job, "unknown");
        assert_eq!(targets[1].last_error, "connection refused");
        assert!(parse_targets(&json!({ "status": "success" })).is_empty());
    }

    #[test]
    fn test_status_serializes_flat() {
        let status = StackStatus::default();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["healthy"], false);
        assert_eq!(json["alertsFiring"], 0);
        assert_eq!(json["targetsUp"], 0);
        assert!(json["lastSeen"]["metrics"].is_null());
        assert!(json.get("services").is_some());
    }
}
