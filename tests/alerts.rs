//! Alert creation committed through the apply transaction.

use faultline_control::alerts::{AlertTemplate, CreateAlertRequest, GENERATED_GROUP};
use faultline_control::error::ControlError;
use faultline_control::orchestrator::ApplyStage;
use faultline_control::store::Role;

mod common;
use common::TestStack;

fn error_rate(threshold: f64) -> CreateAlertRequest {
    CreateAlertRequest {
        template: AlertTemplate::HighErrorRate,
        service: "checkout".to_string(),
        threshold: Some(threshold),
        duration: None,
    }
}

#[tokio::test]
async fn test_recreating_alert_replaces_it() {
    let stack = TestStack::new();
    let plane = stack.plane();

    let first = plane.create_alert(&error_rate(0.05)).await.unwrap();
    assert_eq!(first.apply.stage, ApplyStage::Committed);
    assert_eq!(first.rule.alert.as_deref(), Some("checkout_high_error_rate"));
    assert_eq!(stack.reload.count(), 1);

    let second = plane.create_alert(&error_rate(0.2)).await.unwrap();
    assert_eq!(second.apply.stage, ApplyStage::Committed);

    let view = plane.alerts().await.unwrap();
    assert_eq!(view.base.groups[0].name, "faultline.base");
    let group = view
        .generated
        .groups
        .iter()
        .find(|g| g.name == GENERATED_GROUP)
        .unwrap();
    let matching: Vec<_> = group
        .rules
        .iter()
        .filter(|r| r.alert.as_deref() == Some("checkout_high_error_rate"))
        .collect();
    assert_eq!(matching.len(), 1);
    assert!(matching[0].expr.ends_with("> 0.2"));

    // Each creation is a recorded version
    assert_eq!(plane.history().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_alert_input_writes_nothing() {
    let stack = TestStack::new();
    let plane = stack.plane();

    let mut request = error_rate(0.1);
    request.service = "  ".to_string();
    let err = plane.create_alert(&request).await.unwrap_err();
    assert!(matches!(err, ControlError::InvalidRuleInput(_)));
    assert_eq!(stack.read_role(Role::GeneratedAlertRules), "");
    assert!(plane.history().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_raw_rules_returns_texts() {
    let stack = TestStack::new();
    let plane = stack.plane();

    let raw = plane.raw_rules().await.unwrap();
    assert_eq!(raw.base_raw, common::ALERT_RULES);
    assert_eq!(raw.generated_raw, "");
}
