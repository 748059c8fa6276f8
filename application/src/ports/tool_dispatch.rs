//! Tool dispatch port
//!
//! What the chat flow needs from a tool registry: the current declarations
//! and a dispatch entry point that never fails with an error type.

use async_trait::async_trait;
use serde_json::Value;
use suna_domain::{FunctionSchema, TagSchema, ToolContext, ToolResult};

#[async_trait]
pub trait ToolDispatchPort: Send + Sync {
    /// Structured-call declarations of every currently routed operation.
    fn function_schemas(&self) -> Vec<FunctionSchema>;

    /// Markup-tag declarations of every currently routed tag.
    fn tag_schemas(&self) -> Vec<TagSchema>;

    /// Cheap, I/O-free introspection snapshot.
    fn stats(&self) -> Value;

    async fn execute_function(
        &self,
        function_name: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult;

    async fn execute_tag(
        &self,
        tag_name: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult;
}
