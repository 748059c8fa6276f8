//! LLM gateway adapters

mod openai;

pub use openai::{DEFAULT_BASE_URL, OpenAiGateway, default_model_aliases};
