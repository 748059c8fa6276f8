//! Application layer for suna-agent
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ChatParams, ThreadParams};
pub use ports::{
    cache::{CacheError, CacheKey, CachePort},
    llm_gateway::{
        Completion, CompletionRequest, GatewayError, LlmGateway, ModelMessage, ModelRole,
        ModelToolCall, Usage,
    },
    tool_dispatch::ToolDispatchPort,
};
pub use use_cases::chat::{
    ChatError, ChatEvent, ChatRequest, ChatStream, ChatUseCase, IncomingMessage,
};
pub use use_cases::session_cache::SessionCache;
pub use use_cases::thread_manager::{SummaryOutcome, ThreadError, ThreadManager};
