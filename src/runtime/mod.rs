//! Shared runtimes used by widgets
//!
//! Heavy dependencies (an interpreter, a plotting backend) are loaded at most
//! once per process and handed out through a [`ResourceRegistry`] passed by
//! reference, instead of living in globals.

mod execution;
mod registry;

pub use execution::{
    execution_service, set_execution_service, ExecutionService, EXECUTION_SERVICE,
};
pub use registry::{ResourceError, ResourceRegistry};
