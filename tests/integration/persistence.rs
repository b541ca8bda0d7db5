//! Integration tests for notebook persistence on both backends

use base64::{engine::general_purpose::STANDARD, Engine};
use livenote::config::{Config, StorageBackend};
use livenote::data::{
    KeyValueBackend, KeyValueNotebookStore, MemoryKv, NotebookStore, SqliteNotebookStore,
    StorageError,
};
use livenote::model::{Cell, Chapter, Notebook, OutputData};
use livenote::LivenoteCore;
use proptest::prelude::*;
use tempfile::TempDir;

use super::common::fixtures::{test_core, three_chapter_notebook};

/// A three-chapter notebook lists once and loads back equal
#[test]
fn test_key_value_backend_round_trip() {
    let (core, _dir) = test_core(StorageBackend::KeyValue);
    let store = core.store();
    let notebook = three_chapter_notebook();
    assert_eq!(notebook.chapters().len(), 3);

    store.save(&notebook).unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(&listed[0].id, notebook.id());
    assert_eq!(listed[0].title, "Thermodynamics");
    assert_eq!(store.load(notebook.id()).unwrap(), Some(notebook));
}

/// Large images are split into assets and inlined again on load
#[test]
fn test_sqlite_backend_externalizes_large_images() {
    let (core, _dir) = test_core(StorageBackend::Sqlite);
    let image = format!("data:image/png;base64,{}", STANDARD.encode(vec![7u8; 40_000]));
    let mut plot = Cell::code("plot()", "python");
    plot.set_output(Some(OutputData::image(image.clone())));
    let mut notebook = Notebook::new("Figures", "");
    notebook.add_chapter(Chapter::with_cells("Plots", vec![plot]), None);

    core.store().save(&notebook).unwrap();

    let assets = SqliteNotebookStore::new(core.database().connection());
    assert_eq!(assets.asset_ids(notebook.id()).unwrap().len(), 1);

    let loaded = core.store().load(notebook.id()).unwrap().unwrap();
    let output = loaded.chapters()[1].cells()[0].output().unwrap();
    assert_eq!(output.content, image);
    assert_eq!(loaded, notebook);
}

/// Saved notebooks survive reopening the database
#[test]
fn test_reopen_database() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test.db");
    let notebook = three_chapter_notebook();
    {
        let core = LivenoteCore::open(Config::default(), db_path.clone()).unwrap();
        core.store().save(&notebook).unwrap();
    }

    let core = LivenoteCore::open(Config::default(), db_path).unwrap();
    assert_eq!(core.store().load(notebook.id()).unwrap(), Some(notebook));
}

/// A corrupt stored document is an error, never a partial notebook
#[test]
fn test_malformed_document_rejected() {
    let (core, _dir) = test_core(StorageBackend::KeyValue);
    let notebook = three_chapter_notebook();
    core.store().save(&notebook).unwrap();
    core.app_state_store()
        .set(&format!("notebook_{}", notebook.id()), "{\"chapters\": [")
        .unwrap();

    assert!(matches!(
        core.store().load(notebook.id()),
        Err(StorageError::Malformed(_))
    ));
}

/// A save that exceeds the quota leaves the previous version intact
#[test]
fn test_quota_failure_keeps_previous_version() {
    let store = KeyValueNotebookStore::new(MemoryKv::with_quota(4_000));
    let mut notebook = Notebook::new("Small", "");
    store.save(&notebook).unwrap();

    notebook.description = "x".repeat(5_000);
    let err = store.save(&notebook).unwrap_err();
    assert!(err.is_quota());

    let loaded = store.load(notebook.id()).unwrap().unwrap();
    assert!(loaded.description.is_empty());
    assert!(store.backend().usage() <= 4_000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_documents_round_trip(
        title in "\\PC{0,40}",
        chapters in prop::collection::vec(("[a-zA-Z ]{0,20}", "\\PC{0,60}"), 0..4),
    ) {
        let mut notebook = Notebook::new(title, "");
        for (chapter_title, source) in chapters {
            notebook.add_chapter(
                Chapter::with_cells(chapter_title, vec![Cell::code(source, "python")]),
                None,
            );
        }

        let store = KeyValueNotebookStore::new(MemoryKv::new());
        store.save(&notebook).unwrap();
        prop_assert_eq!(store.load(notebook.id()).unwrap(), Some(notebook));
    }
}
