//! Domain layer for suna-agent
//!
//! This crate contains the core entities and value objects of the agent's
//! tool and conversation subsystems. It has no dependencies on
//! infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Tools
//!
//! - **Operation schema**: one canonical parameter contract per operation,
//!   projected into structured-call and markup-tag descriptors
//! - **Tool**: a named, versioned capability that validates and executes operations
//!
//! ## Threads
//!
//! - **Thread / Message**: persisted conversation state, ordered by creation
//! - **Summary**: collapsing older turns into one synthetic system message

pub mod thread;
pub mod tool;

// Re-export commonly used types
pub use thread::{
    AiMessage, Message, NewThread, Role, StoreError, SummaryMode, Thread, ThreadPatch,
    ThreadRepository, ThreadStats,
};
pub use tool::{
    ErrorKind, FunctionSchema, OperationSchema, ParamSpec, ParamType, SchemaDescriptor, TagSchema,
    TagSpec, Tool, ToolContext, ToolError, ToolLifecycleError, ToolResult, ToolSchemas,
    ValidationError,
};
