//! Tool domain value objects: results, errors, and execution context
//!
//! Every tool boundary returns a [`ToolResult`] rather than a `Result`, so
//! callers of the registry never see a panic or an error type escape. The
//! [`ErrorKind`] lets callers (and tests) tell failure classes apart:
//!
//! | Kind | Code | Raised when |
//! |------|------|-------------|
//! | `InvalidArgument` | `INVALID_ARGUMENT` | Parameters failed validation |
//! | `PermissionDenied` | `PERMISSION_DENIED` | Allow-list, deny pattern, sandbox, extension |
//! | `ExecutionFailed` | `EXECUTION_FAILED` | Non-zero exit, I/O error, non-2xx response |
//! | `Timeout` | `TIMEOUT` | Command or fetch exceeded its deadline |
//! | `NotFound` | `NOT_FOUND` | Unknown operation, tag, or resource |
//! | `Internal` | `INTERNAL` | A tool panicked inside the registry envelope |

use super::validation::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Failure class of a [`ToolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    PermissionDenied,
    ExecutionFailed,
    Timeout,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::ExecutionFailed => "EXECUTION_FAILED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Caller-induced failures (bad input or policy), as opposed to system faults.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidArgument | ErrorKind::PermissionDenied | ErrorKind::NotFound
        )
    }
}

/// Error carried by a failed [`ToolResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    #[serde(rename = "code")]
    pub kind: ErrorKind,
    /// Human-readable, never empty
    pub message: String,
    /// Partial output or structured context (stdout/stderr, HTTP status, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            format!("Tool failed ({})", kind.code())
        } else {
            message
        };
        Self {
            kind,
            message,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExecutionFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ToolError {}

impl From<ValidationError> for ToolError {
    fn from(err: ValidationError) -> Self {
        let fields: Map<String, Value> = err
            .errors
            .iter()
            .map(|e| (e.path.clone(), Value::from(e.reason.clone())))
            .collect();
        ToolError::invalid_argument(err.to_string()).with_details(Value::Object(fields))
    }
}

/// Outcome of a tool operation.
///
/// A failed result never carries `data`; a successful one never carries `error`.
/// The constructors are the only way these invariants are established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ToolError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: None,
        }
    }

    pub fn failure(error: ToolError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            metadata: None,
        }
    }

    /// Standard result for an operation name the tool does not implement.
    pub fn unknown_operation(tool: &str, operation: &str) -> Self {
        Self::failure(ToolError::not_found(format!(
            "Unknown function: {operation} for tool {tool}"
        )))
    }

    /// Attach one metadata entry. Metadata is passthrough and never inspected.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.error.as_ref()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }
}

impl From<ToolError> for ToolResult {
    fn from(error: ToolError) -> Self {
        ToolResult::failure(error)
    }
}

impl From<ValidationError> for ToolResult {
    fn from(error: ValidationError) -> Self {
        ToolResult::failure(error.into())
    }
}

/// Per-request execution context, built by the thread manager.
///
/// Never persisted by the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolContext {
    pub user_id: String,
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ToolContext {
    pub fn new(user_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: thread_id.into(),
            ..Default::default()
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::schema::{OperationSchema, ParamSpec};
    use serde_json::json;

    #[test]
    fn test_success_has_no_error() {
        let result = ToolResult::success(json!({"stdout": "hi"})).with_metadata("duration_ms", 3);
        assert!(result.is_success());
        assert!(result.error().is_none());
        assert_eq!(result.data().unwrap()["stdout"], "hi");
        assert_eq!(result.metadata().unwrap()["duration_ms"], 3);
    }

    #[test]
    fn test_failure_has_no_data() {
        let result = ToolResult::failure(ToolError::timeout("Command timed out after 5 seconds"));
        assert!(!result.is_success());
        assert!(result.data().is_none());
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_empty_message_replaced() {
        let err = ToolError::execution_failed("  ");
        assert_eq!(err.message, "Tool failed (EXECUTION_FAILED)");
    }

    #[test]
    fn test_validation_error_conversion() {
        let op = OperationSchema::new("execute", "Run")
            .param(ParamSpec::string("command", "Command").required());
        let result: ToolResult = op.validate(&json!({})).unwrap_err().into();
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidArgument);
        assert!(error.message.starts_with("Parameter validation failed for execute"));
        assert_eq!(error.details.as_ref().unwrap()["command"], "required");
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(ToolResult::failure(ToolError::not_found("nope"))).unwrap();
        assert_eq!(value, json!({"success": false, "error": {"code": "NOT_FOUND", "message": "nope"}}));
    }

    #[test]
    fn test_unknown_operation_message() {
        let result = ToolResult::unknown_operation("shell", "format_disk");
        assert!(result.error_message().unwrap().contains("Unknown function: format_disk"));
    }
}
