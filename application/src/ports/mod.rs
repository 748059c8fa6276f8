//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod cache;
pub mod llm_gateway;
pub mod tool_dispatch;
