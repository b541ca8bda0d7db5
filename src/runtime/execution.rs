//! Execution service seam
//!
//! Running code is delegated to whatever interpreter the host wires in.

use std::sync::Arc;

use async_trait::async_trait;

use super::ResourceRegistry;
use crate::model::OutputData;

/// Registry key of the execution service
pub const EXECUTION_SERVICE: &str = "execution";

/// Runs source text and reports a single output.
///
/// Failures are reported as an [`OutputData`] of kind `error`, never as a
/// Rust error, so widgets can display them like any other output.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn execute(&self, source: &str) -> OutputData;
}

/// Install the execution service. Returns false if one is already loaded.
pub fn set_execution_service(
    resources: &ResourceRegistry,
    service: Arc<dyn ExecutionService>,
) -> bool {
    resources.provide(EXECUTION_SERVICE, service)
}

pub fn execution_service(resources: &ResourceRegistry) -> Option<Arc<dyn ExecutionService>> {
    resources
        .get::<Arc<dyn ExecutionService>>(EXECUTION_SERVICE)
        .map(|service| service.as_ref().clone())
}
