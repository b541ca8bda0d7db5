//! Persistence layer for livenote
//!
//! Notebooks are stored through the [`NotebookStore`] interface. Two
//! backends exist: a SQLite document store with an asset table, and a
//! key-value layout that works over any [`KeyValueBackend`].

mod app_state;
mod autosave;
mod database;
mod error;
mod file;
mod kv;
mod migrations;
mod notebook;
mod store;

pub use app_state::AppStateStore;
pub use autosave::{AutoSave, AutosaveStats, AutosaveTarget};
pub use database::{Database, DatabaseError};
pub use error::StorageError;
pub use file::FileStore;
pub use kv::{KeyValueBackend, KeyValueNotebookStore, MemoryKv, DEFAULT_PREFIX};
pub use notebook::{
    asset_id, decode_data_uri, Asset, SqliteNotebookStore, ASSET_REF_PREFIX,
    DEFAULT_ASSET_THRESHOLD,
};
pub use store::{NotebookStore, NotebookSummary};
