//! Notebook entity model
//!
//! Notebook owns Chapters, Chapters own Cells. Records are created through
//! factories so ids and timestamps are always populated, and mutated through
//! their own methods so ordering and `updatedAt` stay consistent.

mod cell;
mod chapter;
mod id;
mod notebook;

use thiserror::Error;

pub use cell::{Cell, CellStatus, CellType, OutputData, OutputKind};
pub use chapter::Chapter;
pub use id::Id;
pub(crate) use id::timestamp;
pub use notebook::{
    Notebook, NotebookMetadata, NotebookSettings, DEFAULT_AUTOSAVE_INTERVAL_MS, FORMAT_VERSION,
};

/// Free-form metadata map
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Cannot delete the last chapter")]
    LastChapter,
    #[error("Chapter not found: {0}")]
    ChapterNotFound(Id),
    #[error("Cell not found: {0}")]
    CellNotFound(Id),
    #[error("Invalid cell status transition: {} -> {}", from.as_str(), to.as_str())]
    InvalidTransition { from: CellStatus, to: CellStatus },
}
