//! Integration tests for the clone-to-new-window handoff

use livenote::config::StorageBackend;
use livenote::core::{clone_region, restore_from_url, ClonedRestore};
use livenote::data::KeyValueBackend;
use livenote::snapshot::{FieldValue, MemoryRegion};

use super::common::fixtures::{echo_core, three_chapter_notebook};

#[tokio::test]
async fn test_cloned_window_matches_source() {
    let (core, _echo, _dir) = echo_core(StorageBackend::Sqlite);
    let notebook = three_chapter_notebook();
    let code_cell = notebook.chapters()[0].cells()[1].id();
    let source_id = format!("{code_cell}-source");

    let mut controller = core.controller(notebook);
    controller.open().await.unwrap();
    controller
        .region_mut()
        .edit(&source_id, FieldValue::Text("z = 9".into()));

    let fragment = clone_region(controller.region(), core.app_state_store())
        .await
        .unwrap();
    let url = format!("file:///notes/index.html{fragment}");

    let widgets = core.widgets();
    let mut window = MemoryRegion::new();
    let restored = restore_from_url(
        &url,
        &mut window,
        core.app_state_store(),
        Some(&widgets),
        core.config().restore_options(),
    )
    .await
    .unwrap();

    let Some(ClonedRestore {
        url: clean,
        report: Some(report),
    }) = restored
    else {
        panic!("clone entry was not restored");
    };
    assert_eq!(clean, "file:///notes/index.html");
    assert_eq!(report.sections_restored, 2);
    assert_eq!(window.section_count(), 2);
    assert_eq!(
        window.control_value(&source_id),
        Some(FieldValue::Text("z = 9".into()))
    );
    assert!(core.app_state_store().keys("clone_").unwrap().is_empty());
}

#[tokio::test]
async fn test_second_restore_finds_nothing() {
    let (core, _echo, _dir) = echo_core(StorageBackend::KeyValue);
    let mut controller = core.controller(three_chapter_notebook());
    controller.open().await.unwrap();

    let fragment = clone_region(controller.region(), core.app_state_store())
        .await
        .unwrap();
    let url = format!("app{fragment}");
    let options = core.config().restore_options();

    let mut first = MemoryRegion::new();
    restore_from_url(&url, &mut first, core.app_state_store(), None, options.clone())
        .await
        .unwrap();

    let mut second = MemoryRegion::new();
    let again = restore_from_url(&url, &mut second, core.app_state_store(), None, options)
        .await
        .unwrap()
        .unwrap();
    assert!(again.report.is_none());
    assert_eq!(core.purge_expired_clones().unwrap(), 0);
}
