//! The [`Tool`] capability trait
//!
//! Lifecycle, as driven by the registry:
//!
//! ```text
//! construct ──▶ init() ──▶ schemas() ──▶ execute()* ──▶ cleanup()
//!                 │ (once)    (once, snapshotted)          (once)
//!                 └── Err ──▶ not registered
//! ```

use super::schema::OperationSchema;
use super::value_objects::{ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure of `init()` or `cleanup()`.
#[derive(Debug, Error)]
pub enum ToolLifecycleError {
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// A named, versioned capability exposing one or more operations.
///
/// `execute` must never panic for bad input and must dispatch unknown
/// operation names to [`ToolResult::unknown_operation`]. Parameter validation
/// happens inside `execute` before any side effect.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn version(&self) -> &str {
        "1.0.0"
    }

    /// One-time setup. A failure aborts registration.
    async fn init(&mut self) -> Result<(), ToolLifecycleError> {
        Ok(())
    }

    /// Canonical operation schemas. Pure and deterministic.
    fn schemas(&self) -> Vec<OperationSchema>;

    async fn execute(
        &self,
        operation: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult;

    /// Release held resources. Errors are logged by the caller, never propagated.
    async fn cleanup(&self) -> Result<(), ToolLifecycleError> {
        Ok(())
    }
}

/// Look up an operation schema by name.
pub fn find_operation<'a>(
    schemas: &'a [OperationSchema],
    operation: &str,
) -> Option<&'a OperationSchema> {
    schemas.iter().find(|s| s.name == operation)
}
