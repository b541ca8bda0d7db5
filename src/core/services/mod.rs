//! Static service functions over [`crate::core::LivenoteCore`]

pub mod error;
mod notebook_service;

pub use error::ServiceError;
pub use notebook_service::{CreateNotebookParams, NotebookService};
