//! Integration tests for switching chapters through the controller

use std::sync::Arc;
use std::time::Duration;

use livenote::config::StorageBackend;
use livenote::core::{NotebookController, SwitchPhase};
use livenote::data::NotebookStore;
use livenote::model::{CellStatus, Id, OutputKind};
use livenote::snapshot::{FieldValue, MemoryRegion};

use super::common::fixtures::{echo_core, three_chapter_notebook};

fn control_id(cell_id: &Id, name: &str) -> String {
    format!("{cell_id}-{name}")
}

/// Unsaved edits in chapter A survive a round trip through chapter B
#[tokio::test]
async fn test_edits_survive_switch_and_back() {
    let (core, _echo, _dir) = echo_core(StorageBackend::Sqlite);
    let notebook = three_chapter_notebook();
    let chapter_a = notebook.chapters()[0].id().clone();
    let chapter_b = notebook.chapters()[1].id().clone();
    let code_cell = notebook.chapters()[0].cells()[1].id().clone();

    let mut controller = core.controller(notebook);
    controller.open().await.unwrap();

    let edited = FieldValue::Text("print(\"edited\")\nx = 2".to_string());
    assert!(controller
        .region_mut()
        .edit(&control_id(&code_cell, "source"), edited.clone()));

    controller.switch_chapter(&chapter_b).await.unwrap();
    controller.switch_chapter(&chapter_a).await.unwrap();

    assert_eq!(controller.phase(), SwitchPhase::Idle);
    assert_eq!(
        controller.region().control_value(&control_id(&code_cell, "source")),
        Some(edited)
    );
    assert_eq!(
        controller.notebook().chapter(&chapter_a).unwrap().cells()[1].content(),
        "print(\"edited\")\nx = 2"
    );

    let stored = core.store().load(controller.notebook().id()).unwrap().unwrap();
    assert_eq!(
        stored.chapter(&chapter_a).unwrap().cells()[1].content(),
        "print(\"edited\")\nx = 2"
    );
}

/// Slider positions are kept per chapter
#[tokio::test]
async fn test_slider_position_survives_switch() {
    let (core, echo, _dir) = echo_core(StorageBackend::KeyValue);
    let notebook = three_chapter_notebook();
    let chapter_a = notebook.chapters()[0].id().clone();
    let plots = notebook.chapters()[2].id().clone();
    let slider = notebook.chapters()[2].cells()[0].id().clone();

    let mut controller = core.controller(notebook);
    controller.open().await.unwrap();
    controller.switch_chapter(&plots).await.unwrap();
    assert_eq!(
        controller.region().control_value(&control_id(&slider, "t")),
        Some(FieldValue::Number(300.0))
    );

    controller
        .region_mut()
        .edit(&control_id(&slider, "t"), FieldValue::Number(120.0));
    controller.switch_chapter(&chapter_a).await.unwrap();
    assert!(echo.calls() >= 1);

    controller.switch_chapter(&plots).await.unwrap();
    assert_eq!(
        controller.region().control_value(&control_id(&slider, "t")),
        Some(FieldValue::Number(120.0))
    );
}

/// Running a code section stores its output on the cell
#[tokio::test]
async fn test_run_code_section() {
    let (core, echo, _dir) = echo_core(StorageBackend::Sqlite);
    let notebook = three_chapter_notebook();
    let code_cell = notebook.chapters()[0].cells()[1].id().clone();

    let mut controller = core.controller(notebook);
    controller.open().await.unwrap();
    let output = controller
        .run_section(&code_cell.to_string())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(output.kind, OutputKind::Text);
    assert_eq!(output.content, "out: print(\"Hello, World!\")");
    assert_eq!(echo.calls(), 1);

    let cell = &controller.notebook().chapters()[0].cells()[1];
    assert_eq!(cell.status(), CellStatus::Success);
    assert_eq!(cell.output(), Some(&output));
}

/// A new chapter shows the placeholder and is persisted
#[tokio::test]
async fn test_add_chapter_shows_placeholder() {
    let (core, _echo, _dir) = echo_core(StorageBackend::Sqlite);
    let mut controller = core.controller(three_chapter_notebook());
    controller.open().await.unwrap();

    let id = controller.add_chapter("").await.unwrap();

    assert_eq!(controller.notebook().active_chapter_id(), Some(&id));
    assert_eq!(controller.region().placeholder(), Some("Chapter 4"));
    let tabs = controller.tabs();
    assert_eq!(tabs.len(), 4);
    assert!(tabs[3].active);

    let stored = core.store().load(controller.notebook().id()).unwrap().unwrap();
    assert_eq!(stored.chapters().len(), 4);
    assert!(stored.chapter(&id).unwrap().is_empty());
}

/// The autosave timer persists edits without an explicit save
#[tokio::test(start_paused = true)]
async fn test_autosave_persists_edits() {
    let (core, _echo, _dir) = echo_core(StorageBackend::Sqlite);
    let notebook = three_chapter_notebook();
    let notebook_id = notebook.id().clone();
    let code_cell = notebook.chapters()[0].cells()[1].id().clone();

    let mut controller = core.controller(notebook);
    controller.open().await.unwrap();
    controller
        .region_mut()
        .edit(&control_id(&code_cell, "source"), FieldValue::Text("y = 3".into()));

    let shared = Arc::new(tokio::sync::Mutex::new(controller));
    let mut autosave: livenote::data::AutoSave = NotebookController::<MemoryRegion>::spawn_autosave(
        shared.clone(),
        Duration::from_secs(1),
    );
    tokio::time::sleep(Duration::from_millis(1500)).await;
    autosave.stop();

    assert_eq!(autosave.stats().saves(), 1);
    let stored = core.store().load(&notebook_id).unwrap().unwrap();
    assert_eq!(stored.chapters()[0].cells()[1].content(), "y = 3");
}
