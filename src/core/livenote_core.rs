//! Core infrastructure shared by every front end.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use super::clone::purge_expired_clones;
use super::{ControllerError, NotebookController};
use crate::config::{Config, StorageBackend};
use crate::data::{
    AppStateStore, Database, DatabaseError, KeyValueNotebookStore, NotebookStore,
    SqliteNotebookStore,
};
use crate::model::{CellType, Notebook};
use crate::runtime::{set_execution_service, ExecutionService, ResourceRegistry};
use crate::snapshot::{MemoryRegion, WidgetRegistry};
use crate::widgets::default_registry;

/// Core infrastructure for livenote.
///
/// This struct owns the foundational components:
/// - Database connection and the notebook store selected by config
/// - The key-value table used for clone handoffs
/// - Shared widget runtimes
pub struct LivenoteCore {
    /// Application configuration
    config: Config,
    /// Database connection (owned to keep connection alive)
    database: Database,
    /// Key-value table (clone entries, and notebooks on the key-value backend)
    app_state_store: AppStateStore,
    /// Notebook persistence
    store: Arc<dyn NotebookStore>,
    /// Runtimes shared by widgets
    resources: Arc<ResourceRegistry>,
}

impl LivenoteCore {
    /// Open the default database (~/.livenote/livenote.db)
    pub fn new(config: Config) -> Result<Self, DatabaseError> {
        Self::open(config, crate::util::database_path())
    }

    /// Open the database at `db_path` and build the configured store
    pub fn open(config: Config, db_path: PathBuf) -> Result<Self, DatabaseError> {
        let database = Database::open(db_path)?;

        let (app_state_store, store): (AppStateStore, Arc<dyn NotebookStore>) =
            match config.storage.backend {
                StorageBackend::Sqlite => {
                    let app_state = AppStateStore::new(database.connection());
                    let store = SqliteNotebookStore::new(database.connection())
                        .with_asset_threshold(config.storage.asset_threshold_bytes);
                    (app_state, Arc::new(store))
                }
                StorageBackend::KeyValue => {
                    let app_state = AppStateStore::new(database.connection())
                        .with_quota(config.storage.kv_quota_bytes);
                    let store = KeyValueNotebookStore::with_prefix(
                        app_state.clone(),
                        config.storage.kv_prefix.clone(),
                    );
                    (app_state, Arc::new(store))
                }
            };

        let resources = Arc::new(ResourceRegistry::new());

        tracing::debug!(
            backend = config.storage.backend.as_str(),
            path = %database.path.display(),
            "Core initialized"
        );

        Ok(Self {
            config,
            database,
            app_state_store,
            store,
            resources,
        })
    }

    /// Get the application configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get the notebook store.
    pub fn store(&self) -> Arc<dyn NotebookStore> {
        self.store.clone()
    }

    /// Key-value table holding clone entries
    pub fn app_state_store(&self) -> &AppStateStore {
        &self.app_state_store
    }

    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    /// Install the interpreter used by code and slider sections. The first
    /// one installed wins; without one, running code fails.
    pub fn set_execution_service(&self, service: Arc<dyn ExecutionService>) -> bool {
        set_execution_service(&self.resources, service)
    }

    /// A fresh widget registry backed by the shared runtimes
    pub fn widgets(&self) -> WidgetRegistry {
        default_registry(self.resources.clone())
    }

    /// New notebook with the configured defaults applied. Not persisted.
    pub fn new_notebook(&self, title: &str, description: &str) -> Notebook {
        let defaults = &self.config.notebook;
        let mut notebook = Notebook::new(title, description);
        notebook.metadata.author = defaults.author.clone();
        notebook.settings.theme = defaults.theme.clone();
        notebook.settings.default_language = defaults.default_language.clone();
        notebook.settings.auto_save = self.config.autosave.enabled;
        notebook.settings.auto_save_interval = self.config.autosave.interval_ms;

        for chapter in notebook.chapters_mut() {
            for cell in chapter.cells_mut() {
                if cell.cell_type() == CellType::Code {
                    cell.language = defaults.default_language.clone();
                }
            }
        }
        notebook
    }

    /// Controller over an in-memory region for `notebook`
    pub fn controller(&self, notebook: Notebook) -> NotebookController<MemoryRegion> {
        NotebookController::new(notebook, MemoryRegion::new(), self.store(), self.widgets())
            .with_restore_options(self.config.restore_options())
    }

    /// Drop clone entries older than the configured TTL
    pub fn purge_expired_clones(&self) -> Result<usize, ControllerError> {
        purge_expired_clones(&self.app_state_store, self.config.clone_ttl(), Utc::now())
    }
}
