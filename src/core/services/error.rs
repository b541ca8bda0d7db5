use thiserror::Error;

use crate::core::ControllerError;
use crate::data::StorageError;
use crate::model::ModelError;

/// Error surface shared by the service layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QuotaExceeded { .. } => ServiceError::InvalidInput(err.to_string()),
            StorageError::Malformed(e) => ServiceError::InvalidInput(format!("Malformed notebook: {e}")),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<ModelError> for ServiceError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ChapterNotFound(_) | ModelError::CellNotFound(_) => {
                ServiceError::NotFound(err.to_string())
            }
            ModelError::LastChapter | ModelError::InvalidTransition { .. } => {
                ServiceError::InvalidInput(err.to_string())
            }
        }
    }
}

impl From<ControllerError> for ServiceError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::Storage(e) => e.into(),
            ControllerError::Model(e) => e.into(),
            ControllerError::LastChapter => ServiceError::InvalidInput(err.to_string()),
            ControllerError::ChapterNotFound(_) | ControllerError::SectionNotFound(_) => {
                ServiceError::NotFound(err.to_string())
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}
