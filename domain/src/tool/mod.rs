//! Tool domain module
//!
//! Pure definitions for the tool system: the canonical operation schema and
//! its two model-facing projections, parameter validation, the [`Tool`]
//! capability trait, and the result/error/context value objects.
//!
//! ```text
//! ┌────────────────┐    ┌────────────────┐    ┌────────────────┐
//! │ OperationSchema│───▶│ validate/parse │───▶│ Tool::execute  │──▶ ToolResult
//! │ (one per op)   │    │ (all errors)   │    │ (side effects) │
//! └───────┬────────┘    └────────────────┘    └────────────────┘
//!         ├─▶ FunctionSchema (structured calls)
//!         └─▶ TagSchema      (markup tags)
//! ```
//!
//! # Architecture
//!
//! - **Domain** (this module): schemas, validation, value objects. No I/O.
//! - **Application** (`ToolDispatchPort`): what the chat flow needs from a registry.
//! - **Infrastructure** (`ToolRegistry`, concrete tools): process, filesystem,
//!   and network side effects.

pub mod schema;
pub mod traits;
pub mod validation;
pub mod value_objects;

pub use schema::{
    FunctionSchema, OperationSchema, ParamSpec, ParamType, SchemaDescriptor, TagParameter,
    TagSchema, TagSpec, ToolSchemas, schema_map,
};
pub use traits::{Tool, ToolLifecycleError, find_operation};
pub use validation::{FieldError, ValidationError};
pub use value_objects::{ErrorKind, ToolContext, ToolError, ToolResult};
