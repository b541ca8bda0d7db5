//! Storage error type shared by every backend

use thiserror::Error;

use super::database::DatabaseError;
use crate::snapshot::SnapshotError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage quota exceeded: need {needed} bytes, quota is {quota}")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Malformed(#[from] SnapshotError),
    #[error("Lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}
