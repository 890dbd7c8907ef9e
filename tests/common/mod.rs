//! Shared fixtures and test doubles for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use faultline_control::config::{ControlPlaneConfig, ReloadConfig};
use faultline_control::control_plane::ControlPlane;
use faultline_control::effects::{ContainerControl, ReloadSignal};
use faultline_control::error::{ControlError, ControlResult};
use faultline_control::health::{HealthSource, HealthSummary, ServiceHealth, SignalReader};
use faultline_control::store::Role;

pub const GENERATED_INCLUDE: &str = "/etc/prometheus/rules/faultline-generated-alerts.yml";

pub const COMPOSE: &str = r#"services:
  prometheus:
    image: prom/prometheus
    command:
    - --config.file=/etc/prometheus/prometheus.yml
    - --storage.tsdb.retention.time=200h
  otel-collector:
    image: otel/opentelemetry-collector-contrib
"#;

pub const SCRAPER: &str = r#"global:
  scrape_interval: 15s
rule_files:
- /etc/prometheus/rules/faultline-alerts.yml
- /etc/prometheus/rules/faultline-generated-alerts.yml
scrape_configs:
- job_name: otel-collector-exporter
  static_configs:
  - targets:
    - otel-collector:8889
"#;

/// A hand-edited scraper config written before the generated rules existed.
pub const LEGACY_SCRAPER: &str = r#"global:
  scrape_interval: 15s   # tuned
rule_files:
  - /etc/prometheus/rules/faultline-alerts.yml
scrape_configs:
  - job_name: otel-collector-exporter
    static_configs:
      - targets: ['otel-collector:8889']
"#;

pub const COLLECTOR: &str = r#"receivers:
  otlp:
    protocols:
      http:
        endpoint: 0.0.0.0:4318
exporters:
  prometheus:
    endpoint: 0.0.0.0:8889
  otlphttp/tempo:
    endpoint: http://tempo:4318
service:
  pipelines:
    metrics:
      receivers: [otlp]
      exporters: [prometheus]
    traces:
      receivers: [otlp]
      exporters: [otlphttp/tempo]
"#;

pub const TEMPO: &str = r#"distributor:
  receivers:
    otlp:
      protocols:
        http:
          endpoint: 0.0.0.0:4318
"#;

pub const LOKI: &str = "auth_enabled: false\n";

pub const ALERT_RULES: &str = r#"groups:
- name: faultline.base
  rules:
  - alert: InstanceDown
    expr: up == 0
    for: 1m
"#;

/// A collector config that still passes validation but differs from [`COLLECTOR`].
pub fn collector_variant(tag: &str) -> String {
    format!("{}# revision {}\n", COLLECTOR, tag)
}

/// Records every restart; names in `failing` fail.
#[derive(Default)]
pub struct RecordingContainers {
    pub restarts: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
    pub failing: Mutex<HashSet<String>>,
    pub running: Mutex<HashSet<String>>,
}

impl RecordingContainers {
    pub fn restart_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn restarted(&self) -> Vec<String> {
        self.restarts.lock().unwrap().clone()
    }

    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl ContainerControl for RecordingContainers {
    async fn restart(&self, name: &str) -> ControlResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(name) {
            return Err(ControlError::external(
                format!("restart {}", name),
                "container exited with code 1",
            ));
        }
        self.restarts.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn is_running(&self, name: &str) -> bool {
        self.running.lock().unwrap().contains(name)
    }
}

#[derive(Default)]
pub struct RecordingReload {
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
}

impl RecordingReload {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReloadSignal for RecordingReload {
    async fn reload(&self) -> ControlResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ControlError::external(
                "prometheus reload",
                "prometheus reload failed: 500",
            ));
        }
        Ok(())
    }
}

/// Health source whose answer is set by the test.
///
/// When `sabotage` holds a path, the next check replaces that file with a
/// directory so any later write to it fails. A non-zero `delay_ms` holds
/// every check open for that long.
pub struct ScriptedHealth {
    pub calls: AtomicUsize,
    pub healthy: AtomicBool,
    pub delay_ms: AtomicU64,
    pub sabotage: Mutex<Option<PathBuf>>,
}

impl Default for ScriptedHealth {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
            delay_ms: AtomicU64::new(0),
            sabotage: Mutex::new(None),
        }
    }
}

impl ScriptedHealth {
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthSource for ScriptedHealth {
    async fn check(&self) -> HealthSummary {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(path) = self.sabotage.lock().unwrap().take() {
            std::fs::remove_file(&path).unwrap();
            std::fs::create_dir(&path).unwrap();
        }

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let status = if self.healthy.load(Ordering::SeqCst) {
            ServiceHealth::up()
        } else {
            ServiceHealth::down("http_503")
        };
        let mut services = BTreeMap::new();
        services.insert("tempo".to_string(), status);
        HealthSummary::from_services(services)
    }
}

pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1";

/// A temp-dir backed stack with valid files and recording collaborators.
pub struct TestStack {
    pub dir: TempDir,
    pub config: ControlPlaneConfig,
    pub containers: Arc<RecordingContainers>,
    pub reload: Arc<RecordingReload>,
    pub health: Arc<ScriptedHealth>,
}

impl TestStack {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ControlPlaneConfig::default();
        config.paths.compose_dir = dir.path().join("compose");
        config.paths.state_dir = dir.path().join("state");
        config.paths.generated_rules_include = GENERATED_INCLUDE.to_string();
        // Nothing listens here; telemetry signals read as "no data"
        for url in [
            &mut config.endpoints.prometheus_url,
            &mut config.endpoints.loki_url,
            &mut config.endpoints.tempo_url,
        ] {
            *url = UNREACHABLE_URL.to_string();
        }
        config.reload = ReloadConfig {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };

        let stack = Self {
            dir,
            config,
            containers: Arc::new(RecordingContainers::default()),
            reload: Arc::new(RecordingReload::default()),
            health: Arc::new(ScriptedHealth::default()),
        };

        for (role, content) in [
            (Role::Compose, COMPOSE),
            (Role::Scraper, SCRAPER),
            (Role::Collector, COLLECTOR),
            (Role::TraceBackend, TEMPO),
            (Role::LogBackend, LOKI),
            (Role::AlertRules, ALERT_RULES),
        ] {
            stack.write_role(role, content);
        }
        stack
    }

    pub fn plane(&self) -> ControlPlane {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap();
        let signals = SignalReader::new(
            client,
            &self.config.endpoints,
            Duration::from_millis(500),
        );

        ControlPlane::with_collaborators(
            self.config.clone(),
            self.containers.clone(),
            self.reload.clone(),
            self.health.clone(),
        )
        .with_signals(signals)
    }

    pub fn role_path(&self, role: Role) -> PathBuf {
        self.config.paths.role_path(role)
    }

    pub fn write_role(&self, role: Role, content: &str) {
        let path = self.role_path(role);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Role text as on disk; a missing file reads as empty.
    pub fn read_role(&self, role: Role) -> String {
        std::fs::read_to_string(self.role_path(role)).unwrap_or_default()
    }

    /// Every role's bytes, for before/after comparisons.
    pub fn live_files(&self) -> Vec<(Role, String)> {
        Role::ALL
            .into_iter()
            .map(|role| (role, self.read_role(role)))
            .collect()
    }
}

/// Start a mock backend on an ephemeral port that always answers `status`.
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (status, body.to_string()) }).await
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let (status, body) = f().await;
                        write_response(&mut socket, status, &body).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock backend that answers by request line: the first route whose
/// pattern occurs in it wins, anything else is a 404.
pub async fn start_routed_backend(routes: Vec<(&'static str, u16, String)>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]);
                let request_line = head.lines().next().unwrap_or_default().to_string();

                let (status, body) = routes
                    .iter()
                    .find(|(pattern, _, _)| request_line.contains(pattern))
                    .map(|(_, status, body)| (*status, body.clone()))
                    .unwrap_or((404, String::new()));
                write_response(&mut socket, status, &body).await;
            });
        }
    });

    addr
}

async fn write_response(socket: &mut tokio::net::TcpStream, status: u16, body: &str) {
    let status_text = match status {
        200 => "200 OK",
        204 => "204 No Content",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };

    let response_str = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    let _ = socket.write_all(response_str.as_bytes()).await;
    let _ = socket.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Mock scraper, trace backend and log backend answering the status queries.
/// Returns their addresses in that order.
pub async fn start_signal_backends() -> (SocketAddr, SocketAddr, SocketAddr) {
    let prometheus = start_routed_backend(vec![
        (
            "ALERTS",
            200,
            r#"{"status":"success","data":{"result":[{"value":[1700000000,"3"]}]}}"#.to_string(),
        ),
        (
            "timestamp",
            200,
            r#"{"status":"success","data":{"result":[{"value":[1700000000,"1700000000.5"]}]}}"#
                .to_string(),
        ),
        (
            "/api/v1/targets",
            200,
            r#"{"status":"success","data":{"activeTargets":[
                {"labels":{"job":"otel-collector-exporter","instance":"otel-collector:8889"},"health":"up","lastError":""},
                {"labels":{"job":"custom-api-8080","instance":"api:8080"},"health":"down","lastError":"connection refused"}
            ]}}"#
                .to_string(),
        ),
    ])
    .await;
    let tempo = start_routed_backend(vec![(
        "/api/search",
        200,
        r#"{"traces":[{"traceID":"abc","startTimeUnixNano":"1700000001000000000"}]}"#.to_string(),
    )])
    .await;
    let loki = start_routed_backend(vec![(
        "/loki/api/v1/query",
        200,
        r#"{"status":"success","data":{"result":[{"stream":{},"values":[["1700000002000000000","line"]]}]}}"#
            .to_string(),
    )])
    .await;
    (prometheus, tempo, loki)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
