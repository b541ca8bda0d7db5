//! Notebook, region and core fixtures

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use livenote::config::{Config, StorageBackend};
use livenote::model::{Cell, Chapter, Notebook, OutputData};
use livenote::runtime::ExecutionService;
use livenote::snapshot::{MemoryRegion, SectionBuilder};
use livenote::LivenoteCore;
use tempfile::TempDir;

/// Create a core over a database in a temporary directory
pub fn test_core(backend: StorageBackend) -> (LivenoteCore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.storage.backend = backend;
    let core = LivenoteCore::open(config, dir.path().join("test.db")).expect("Failed to open core");
    (core, dir)
}

/// Core whose code cells run through [`Echo`]
pub fn echo_core(backend: StorageBackend) -> (LivenoteCore, Arc<Echo>, TempDir) {
    let (core, dir) = test_core(backend);
    let echo = Arc::new(Echo::default());
    core.set_execution_service(echo.clone());
    (core, echo, dir)
}

/// Notebook with three chapters: the default one, "Derivations" and "Plots"
pub fn three_chapter_notebook() -> Notebook {
    let mut notebook = Notebook::new("Thermodynamics", "Course notes");
    notebook.add_chapter(
        Chapter::with_cells(
            "Derivations",
            vec![Cell::latex("dU = TdS - PdV"), Cell::code("k = 1.38e-23", "python")],
        ),
        None,
    );
    notebook.add_chapter(
        Chapter::with_cells(
            "Plots",
            vec![Cell::slider(serde_json::json!({
                "params": {"t": {"min": 0.0, "max": 500.0, "default": 300.0}},
                "script": "plot(t)"
            }))],
        ),
        None,
    );
    notebook
}

/// Region with one form section: a text field "x=1" and a checked checkbox
pub fn form_region(text: &str, checked: bool) -> MemoryRegion {
    let mut builder = SectionBuilder::new("form", "form", "Form");
    builder.text("expr", text).checkbox("enabled", checked);
    let mut region = MemoryRegion::new();
    livenote::LiveRegion::mount(&mut region, builder.finish(), None);
    region
}

/// Execution service that echoes its input and counts calls
#[derive(Default)]
pub struct Echo {
    calls: AtomicUsize,
}

impl Echo {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionService for Echo {
    async fn execute(&self, source: &str) -> OutputData {
        self.calls.fetch_add(1, Ordering::SeqCst);
        OutputData::text(format!("out: {}", source.trim()))
    }
}
