//! Conversation domain module
//!
//! Threads and messages as persisted, the [`ThreadRepository`] contract the
//! store adapters implement, and the pure summarization policy used to keep
//! the model-facing history bounded.

pub mod entities;
pub mod repository;
pub mod summary;

pub use entities::{AiMessage, Message, NewThread, Role, Thread, ThreadPatch, ThreadStats};
pub use repository::{StoreError, ThreadRepository};
pub use summary::{SummaryMode, split_for_summary, summarize, summary_metadata};
