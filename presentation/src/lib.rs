//! Presentation layer for suna-agent
//!
//! This crate contains the CLI definition, the axum HTTP surface and
//! console output formatting.

pub mod cli;
pub mod output;
pub mod server;

// Re-export commonly used types
pub use cli::commands::{Cli, Command};
pub use output::console::ConsoleFormatter;
pub use server::{AppState, router, serve};
