//! Model provider configuration from TOML (`[llm]` section)
//!
//! ```toml
//! [llm]
//! base_url = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! model = "gpt-4o"
//! max_tool_steps = 5
//!
//! [llm.model_aliases]
//! fast = "gpt-4o-mini"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use suna_application::ChatParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLlmConfig {
    /// OpenAI-compatible endpoint root
    pub base_url: String,
    /// Environment variable name for the API key (default: "OPENAI_API_KEY")
    pub api_key_env: String,
    pub model: String,
    /// Added on top of the built-in aliases (`gpt-4` -> `gpt-4o`, ...)
    pub model_aliases: HashMap<String, String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Model round-trips allowed per chat request
    pub max_tool_steps: usize,
    /// Replaces the built-in system prompt when set
    pub system_prompt: Option<String>,
    pub timeout_secs: u64,
    /// Summarize a thread after a turn, keeping this many recent messages
    pub summarize_keep_recent: Option<usize>,
}

impl Default for FileLlmConfig {
    fn default() -> Self {
        let chat = ChatParams::default();
        Self {
            base_url: crate::llm::DEFAULT_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: chat.model,
            model_aliases: HashMap::new(),
            max_tokens: chat.max_tokens,
            temperature: chat.temperature,
            max_tool_steps: chat.max_tool_steps,
            system_prompt: None,
            timeout_secs: 120,
            summarize_keep_recent: None,
        }
    }
}

impl FileLlmConfig {
    /// Key read from the configured environment variable, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }

    /// Chat parameters; thread defaults come from `[threads]`.
    pub fn to_chat_params(&self, default_thread_title: &str) -> ChatParams {
        let mut params = ChatParams {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            max_tool_steps: self.max_tool_steps,
            default_thread_title: default_thread_title.to_string(),
            summarize_keep_recent: self.summarize_keep_recent,
            ..ChatParams::default()
        };
        if let Some(prompt) = &self.system_prompt {
            params.system_prompt = prompt.clone();
        }
        params
    }
}
