//! The storage interface every notebook backend implements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StorageError;
use crate::model::{timestamp, Id, Notebook};

/// Listing entry for a stored notebook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookSummary {
    pub id: Id,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Interchangeable notebook persistence.
///
/// Writes are last-write-wins: two writers saving the same id clobber each
/// other without detection.
pub trait NotebookStore: Send + Sync {
    /// Insert or replace the whole document
    fn save(&self, notebook: &Notebook) -> Result<(), StorageError>;

    /// `Ok(None)` when no notebook has this id. A stored document that fails
    /// to parse is an error; nothing partial is returned.
    fn load(&self, id: &Id) -> Result<Option<Notebook>, StorageError>;

    /// Remove a notebook; deleting an unknown id is a no-op
    fn delete(&self, id: &Id) -> Result<(), StorageError>;

    /// Stored notebooks, most recently updated first
    fn list(&self) -> Result<Vec<NotebookSummary>, StorageError>;
}

/// Pull `updatedAt` out of a stored document without parsing the chapters
pub(crate) fn document_updated_at(raw: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Meta {
        #[serde(with = "timestamp")]
        updated_at: DateTime<Utc>,
    }
    #[derive(Deserialize)]
    struct Header {
        metadata: Meta,
    }
    serde_json::from_str::<Header>(raw)
        .ok()
        .map(|h| h.metadata.updated_at)
}
