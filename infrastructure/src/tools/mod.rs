//! Tool implementations for the agent
//!
//! | Tool | Module | Feature |
//! |------|--------|---------|
//! | `shell` | [`shell`] | always |
//! | `file_operations` | [`file`] | always |
//! | `web_search` | [`web`] | `web-tools` |
//! | `browser_automation` | [`web`] | `web-tools` |
//!
//! Every tool is registered into a [`ToolRegistry`], which routes calls by
//! function name or tag name.

pub mod file;
pub mod shell;
#[cfg(feature = "web-tools")]
pub mod web;

mod registry;

pub use file::{FileTool, FileToolConfig};
pub use registry::{
    Collision, IndexKind, RegisteredTool, RegistrationOptions, RegistryError, RegistryStats,
    ToolRegistry, ToolStats,
};
pub use shell::{ShellTool, ShellToolConfig};
