//! Apply transaction behavior against a temp-dir stack and recording doubles.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use faultline_control::orchestrator::{ApplyRequest, ApplyStage};
use faultline_control::store::{Role, SimpleOverrides};

mod common;
use common::{collector_variant, TestStack};

#[tokio::test]
async fn test_healthy_apply_commits_candidate() {
    let stack = TestStack::new();
    let plane = stack.plane();
    let candidate = collector_variant("a");

    let outcome = plane
        .apply(&ApplyRequest::raw(Role::Collector, candidate.clone()))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.stage, ApplyStage::Committed);
    assert_eq!(outcome.restarted, vec!["otel-collector".to_string()]);
    assert!(outcome.health.as_ref().unwrap().healthy);
    assert_eq!(stack.read_role(Role::Collector), candidate);

    // Collector changes do not touch the scraper
    assert_eq!(stack.reload.count(), 0);

    let history = plane.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, outcome.version_id);
    assert!(history[0].success);
    assert!(history[0].error.is_none());

    let snapshot = stack
        .config
        .paths
        .versions_dir()
        .join(&outcome.version_id)
        .join("collector.snapshot");
    assert_eq!(std::fs::read_to_string(snapshot).unwrap(), common::COLLECTOR);
}

#[tokio::test]
async fn test_rejected_candidate_touches_nothing() {
    let stack = TestStack::new();
    let plane = stack.plane();
    let before = stack.live_files();

    let bad = common::COLLECTOR.replace("http://tempo:4318", "http://wrong-host:4318");
    let outcome = plane
        .apply(&ApplyRequest::raw(Role::Collector, bad))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stage, ApplyStage::Rejected);
    let validation = outcome.validation.unwrap();
    assert!(!validation.valid);
    assert_eq!(validation.errors.len(), 1);

    assert_eq!(stack.live_files(), before);
    assert_eq!(stack.containers.restart_count(), 0);
    assert_eq!(stack.reload.count(), 0);
    assert_eq!(stack.health.count(), 0);

    let history = plane.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
    assert_eq!(
        history[0].error.as_deref(),
        Some("collector trace exporter endpoint must target tempo service")
    );
}

#[tokio::test]
async fn test_unparseable_simple_override_is_rejected() {
    let stack = TestStack::new();
    stack.write_role(Role::Scraper, "scrape_configs: [\n");
    let plane = stack.plane();

    let outcome = plane
        .apply(&ApplyRequest::simple(SimpleOverrides {
            add_scrape_target: Some("api:8080".into()),
            ..Default::default()
        }))
        .await
        .unwrap();

    assert_eq!(outcome.stage, ApplyStage::Rejected);
    assert!(outcome.error.unwrap().starts_with("prometheus.yml"));
    assert_eq!(stack.read_role(Role::Scraper), "scrape_configs: [\n");
    assert_eq!(stack.containers.restart_count(), 0);
}

#[tokio::test]
async fn test_unhealthy_apply_rolls_back_byte_identical() {
    let stack = TestStack::new();
    let plane = stack.plane();
    let before = stack.live_files();
    stack.health.set_healthy(false);

    let outcome = plane
        .apply(&ApplyRequest::raw(Role::Collector, collector_variant("b")))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stage, ApplyStage::RolledBack);
    assert!(outcome.rolled_back);
    assert!(!outcome.inconsistent);
    assert_eq!(outcome.error.as_deref(), Some("health checks failed after apply"));
    assert_eq!(stack.live_files(), before);

    // Changed collector restarted once, then everything during recovery
    assert_eq!(stack.containers.restart_count(), 1 + 5);
    // Recovery always reissues the reload
    assert_eq!(stack.reload.count(), 1);

    let history = plane.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
    assert_eq!(
        history[0].error.as_deref(),
        Some("health checks failed after apply")
    );
}

#[tokio::test]
async fn test_rollback_restores_legacy_scraper_bytes() {
    let stack = TestStack::new();
    stack.write_role(Role::Scraper, common::LEGACY_SCRAPER);
    let plane = stack.plane();
    let before = stack.live_files();
    stack.health.set_healthy(false);

    let outcome = plane
        .apply(&ApplyRequest::raw(Role::Collector, collector_variant("legacy")))
        .await
        .unwrap();

    assert_eq!(outcome.stage, ApplyStage::RolledBack);
    assert_eq!(stack.live_files(), before);
    assert_eq!(stack.read_role(Role::Scraper), common::LEGACY_SCRAPER);
}

#[tokio::test]
async fn test_committed_include_counts_as_scraper_change() {
    let stack = TestStack::new();
    stack.write_role(Role::Scraper, common::LEGACY_SCRAPER);
    let plane = stack.plane();

    let outcome = plane
        .apply(&ApplyRequest::raw(Role::Collector, collector_variant("legacy")))
        .await
        .unwrap();

    assert_eq!(outcome.stage, ApplyStage::Committed);
    assert!(stack.read_role(Role::Scraper).contains(common::GENERATED_INCLUDE));
    // The scraper file changed on disk, so it must be told to re-read it
    assert_eq!(stack.reload.count(), 1);
    assert_eq!(outcome.restarted, vec!["otel-collector".to_string()]);
}

#[tokio::test]
async fn test_restart_failure_rolls_back() {
    let stack = TestStack::new();
    let plane = stack.plane();
    let before = stack.live_files();
    stack.containers.fail("otel-collector");

    let outcome = plane
        .apply(&ApplyRequest::raw(Role::Collector, collector_variant("c")))
        .await
        .unwrap();

    assert_eq!(outcome.stage, ApplyStage::RolledBack);
    assert!(outcome.error.unwrap().contains("otel-collector"));
    // The collector also fails to restart during recovery; that is reported, not fatal
    assert!(outcome.rollback_error.is_some());
    assert!(!outcome.inconsistent);
    assert_eq!(stack.live_files(), before);
    assert_eq!(stack.health.count(), 0);

    let history = plane.history().await.unwrap();
    assert!(history[0].error.as_deref().unwrap().contains("recovery"));
}

#[tokio::test]
async fn test_partial_restart_failure_reports_restarted_services() {
    let stack = TestStack::new();
    let plane = stack.plane();
    stack.containers.fail("prometheus");

    let mut request = ApplyRequest::raw(Role::Collector, collector_variant("p"));
    request
        .raw
        .insert(Role::Compose, format!("{}# pinned\n", common::COMPOSE));
    let outcome = plane.apply(&request).await.unwrap();

    assert_eq!(outcome.stage, ApplyStage::RolledBack);
    assert!(outcome.error.unwrap().contains("restart prometheus"));
    assert_eq!(outcome.restarted, vec!["otel-collector".to_string()]);
}

#[tokio::test]
async fn test_reload_failure_rolls_back_after_retries() {
    let stack = TestStack::new();
    let plane = stack.plane();
    let before = stack.live_files();
    stack.reload.failing.store(true, Ordering::SeqCst);

    let scraper = format!("{}# tuned\n", common::SCRAPER);
    let outcome = plane
        .apply(&ApplyRequest::raw(Role::Scraper, scraper))
        .await
        .unwrap();

    assert_eq!(outcome.stage, ApplyStage::RolledBack);
    assert!(outcome.error.unwrap().contains("prometheus reload failed: 500"));
    assert_eq!(stack.live_files(), before);
    // Two attempts forward, two more during recovery
    assert_eq!(stack.reload.count(), 4);
    assert_eq!(stack.containers.restart_count(), 5);
}

#[tokio::test]
async fn test_failed_restore_is_fail_stop() {
    let stack = TestStack::new();
    let plane = stack.plane();
    stack.health.set_healthy(false);
    *stack.health.sabotage.lock().unwrap() = Some(stack.role_path(Role::Collector));

    let outcome = plane
        .apply(&ApplyRequest::raw(Role::Collector, collector_variant("d")))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stage, ApplyStage::RollbackFailed);
    assert!(outcome.inconsistent);
    assert!(outcome.rollback_error.is_some());

    // No further remediation once the restore failed
    assert_eq!(stack.containers.restart_count(), 1);
    assert_eq!(stack.reload.count(), 0);

    let history = plane.history().await.unwrap();
    assert_eq!(history.len(), 1);
    let error = history[0].error.as_deref().unwrap();
    assert!(error.starts_with("apply error: health checks failed after apply; rollback error: "));
}

#[tokio::test]
async fn test_unchanged_reapply_is_quiet_but_recorded() {
    let stack = TestStack::new();
    let plane = stack.plane();
    let request = ApplyRequest::raw(Role::Collector, collector_variant("e"));

    let first = plane.apply(&request).await.unwrap();
    assert!(first.success);
    let restarts = stack.containers.restart_count();
    let reloads = stack.reload.count();

    let second = plane.apply(&request).await.unwrap();
    assert!(second.success);
    assert!(second.restarted.is_empty());
    assert_eq!(stack.containers.restart_count(), restarts);
    assert_eq!(stack.reload.count(), reloads);

    let history = plane.history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].id < history[1].id);
    assert!(history.iter().all(|r| r.success));
}

#[tokio::test]
async fn test_snapshot_failure_aborts_without_record() {
    let stack = TestStack::new();
    std::fs::create_dir_all(&stack.config.paths.state_dir).unwrap();
    std::fs::write(stack.config.paths.versions_dir(), "not a directory").unwrap();
    let plane = stack.plane();
    let before = stack.live_files();

    let result = plane
        .apply(&ApplyRequest::raw(Role::Collector, collector_variant("f")))
        .await;

    assert!(result.is_err());
    assert_eq!(stack.live_files(), before);
    assert_eq!(stack.containers.restart_count(), 0);
    assert!(plane.history().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_simple_overrides_restart_scraper_and_reload() {
    let stack = TestStack::new();
    let plane = stack.plane();

    let outcome = plane
        .apply(&ApplyRequest::simple(SimpleOverrides {
            prometheus_retention: Some("72h".into()),
            add_scrape_target: Some("api:8080".into()),
            ..Default::default()
        }))
        .await
        .unwrap();

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.restarted, vec!["prometheus".to_string()]);
    assert_eq!(stack.reload.count(), 1);
    assert!(stack
        .read_role(Role::Compose)
        .contains("--storage.tsdb.retention.time=72h"));
    assert!(stack.read_role(Role::Scraper).contains("custom-api-8080"));

    let current = plane.current_config().await.unwrap();
    assert_eq!(current.simple.prometheus_retention, "72h");
    assert_eq!(current.simple.add_scrape_target, "api:8080");
    assert!(current.simple.metrics_pipeline_enabled);
}

#[tokio::test]
async fn test_concurrent_applies_are_serialized() {
    let stack = TestStack::new();
    let plane = Arc::new(stack.plane());

    let handles: Vec<_> = ["g", "h", "i"]
        .into_iter()
        .map(|tag| {
            let plane = plane.clone();
            tokio::spawn(async move {
                plane
                    .apply(&ApplyRequest::raw(Role::Collector, collector_variant(tag)))
                    .await
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    let history = plane.history().await.unwrap();
    assert_eq!(history.len(), 3);
    for pair in history.windows(2) {
        assert!(pair[0].id < pair[1].id);
    }
}

#[tokio::test]
async fn test_validate_does_not_apply() {
    let stack = TestStack::new();
    let plane = stack.plane();

    let result = plane
        .validate(&ApplyRequest::raw(Role::Scraper, "scrape_configs: []\n"))
        .await
        .unwrap();

    assert!(!result.valid);
    assert!(result.errors[0].contains("otel-collector:8889"));
    assert_eq!(stack.read_role(Role::Scraper), common::SCRAPER);
    assert!(plane.history().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dropped_caller_does_not_abandon_commit() {
    let stack = TestStack::new();
    let plane = Arc::new(stack.plane());
    stack.health.delay_ms.store(200, Ordering::SeqCst);
    let candidate = collector_variant("detached");

    let caller = tokio::spawn({
        let plane = plane.clone();
        let request = ApplyRequest::raw(Role::Collector, candidate.clone());
        async move { plane.apply(&request).await }
    });

    // Wait until the commit is holding in the health check, then walk away
    while stack.health.count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    plane.wait_idle().await;

    let history = plane.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
    assert_eq!(stack.read_role(Role::Collector), candidate);
}
