//! Chat parameters: model selection and tool-loop control.
//!
//! [`ChatParams`] groups the static parameters of the
//! [`ChatUseCase`](crate::use_cases::chat::ChatUseCase). Model aliases are
//! resolved by the gateway adapter, not here.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Suna, an autonomous assistant. Use the available tools when they help answer the user. Report tool failures honestly.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on model round-trips per request
    pub max_tool_steps: usize,
    pub system_prompt: String,
    /// Title given to threads created implicitly by a chat request
    pub default_thread_title: String,
    /// Account used when the request carries no user id
    pub anonymous_user: String,
    /// Summarize after a turn once the live history exceeds this many messages
    pub summarize_keep_recent: Option<usize>,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            max_tool_steps: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            default_thread_title: "New Conversation".to_string(),
            anonymous_user: "anonymous".to_string(),
            summarize_keep_recent: None,
        }
    }
}

impl ChatParams {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tool_steps(mut self, steps: usize) -> Self {
        self.max_tool_steps = steps;
        self
    }

    pub fn with_summarize_keep_recent(mut self, keep: Option<usize>) -> Self {
        self.summarize_keep_recent = keep;
        self
    }
}
