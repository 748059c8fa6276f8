//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`ThreadParams`]: cache TTLs and the summarization mode
//! - [`ChatParams`]: model selection and the tool-call loop bound

pub mod chat_params;
pub mod thread_params;

pub use chat_params::ChatParams;
pub use thread_params::ThreadParams;
