//! Integration tests for capturing a live region and restoring it

use super::common::fixtures::{echo_core, form_region};
use livenote::config::StorageBackend;
use livenote::snapshot::{
    capture, Control, FieldKind, FieldValue, LiveRegion, MemoryRegion, RegionSnapshot,
    RestoreOptions, Restorer,
};

/// A text field and a checkbox survive capture, serialization and restore
/// into a freshly rebuilt region
#[tokio::test]
async fn test_form_values_restored_into_rebuilt_region() {
    let source = form_region("x=1", true);
    let snapshot = capture(&source).await.unwrap();
    let raw = snapshot.to_json().unwrap();

    let mut rebuilt = form_region("", false);
    let parsed = RegionSnapshot::from_json(&raw).unwrap();
    let report = Restorer::new(None, RestoreOptions::default())
        .restore(&mut rebuilt, &parsed)
        .await
        .unwrap();

    assert_eq!(report.fields_applied, 2);
    assert!(report.is_complete());
    assert_eq!(
        rebuilt.control_value("form-expr"),
        Some(FieldValue::Text("x=1".to_string()))
    );
    assert_eq!(
        rebuilt.control_value("form-enabled"),
        Some(FieldValue::Bool(true))
    );
}

/// Capturing a restored region yields the same sections and fields again
#[tokio::test]
async fn test_capture_restore_capture_is_stable() {
    let (core, _echo, _dir) = echo_core(StorageBackend::Sqlite);
    let mut controller = core.controller(core.new_notebook("Stable", ""));
    controller.open().await.unwrap();

    let first = capture(controller.region()).await.unwrap();
    assert_eq!(first.sections.len(), 2);

    let widgets = core.widgets();
    let mut fresh = MemoryRegion::new();
    Restorer::new(Some(&widgets), RestoreOptions::default())
        .restore(&mut fresh, &first)
        .await
        .unwrap();

    let second = capture(&fresh).await.unwrap();
    assert_eq!(second.sections, first.sections);
    assert_eq!(second.fields, first.fields);
}

/// Controls without ids are matched by name, not by position
#[tokio::test]
async fn test_named_controls_found_after_reordering() {
    let named = |name: &str, value: f64| Control {
        id: None,
        name: Some(name.to_string()),
        kind: FieldKind::Numeric,
        value: FieldValue::Number(value),
    };

    let mut source = MemoryRegion::new();
    source.push_control(named("alpha", 0.5));
    source.push_control(named("beta", 2.0));
    let snapshot = capture(&source).await.unwrap();

    let mut target = MemoryRegion::new();
    target.push_control(named("beta", 0.0));
    target.push_control(named("alpha", 0.0));
    let report = Restorer::new(None, RestoreOptions::default())
        .restore(&mut target, &snapshot)
        .await
        .unwrap();

    assert_eq!(report.fields_applied, 2);
    let values: Vec<_> = target
        .controls()
        .into_iter()
        .map(|c| (c.name, c.value))
        .collect();
    assert_eq!(
        values,
        vec![
            (Some("beta".to_string()), FieldValue::Number(2.0)),
            (Some("alpha".to_string()), FieldValue::Number(0.5)),
        ]
    );
}

/// A detached region cannot be restored into
#[tokio::test]
async fn test_restore_into_detached_region_fails() {
    let snapshot = capture(&form_region("x=1", true)).await.unwrap();
    let mut target = form_region("", false);
    target.detach();

    let result = Restorer::new(None, RestoreOptions::default())
        .restore(&mut target, &snapshot)
        .await;
    assert!(result.is_err());
}
