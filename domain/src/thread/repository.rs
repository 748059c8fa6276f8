//! Persistence contract for threads and messages

use super::entities::{Message, Thread, ThreadPatch};
use super::summary::SummaryMode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by a [`ThreadRepository`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    /// Message ids are unique across every thread.
    #[error("message already exists: {0}")]
    DuplicateMessage(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored data could not be decoded: {0}")]
    Corrupt(String),
}

/// Authoritative store for threads and messages.
///
/// Message listings are in creation order with ties broken by insertion
/// order. Archived messages are excluded from [`list_messages`](Self::list_messages).
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    async fn insert_thread(&self, thread: &Thread) -> Result<(), StoreError>;

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>, StoreError>;

    async fn update_thread(
        &self,
        thread_id: &str,
        patch: &ThreadPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Thread>, StoreError>;

    /// Delete a thread and all its messages. Returns whether it existed.
    async fn delete_thread(&self, thread_id: &str) -> Result<bool, StoreError>;

    /// Append a message and bump the owning thread's `updated_at`.
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    /// First `limit` live messages of a thread.
    async fn list_messages(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StoreError>;

    /// Merge `patch` into a message's metadata.
    async fn update_message_metadata(
        &self,
        thread_id: &str,
        message_id: &str,
        patch: &Map<String, Value>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Message>, StoreError>;

    /// Append `summary` and archive or delete `superseded` in one step.
    /// On error neither change is visible. Returns how many of `superseded`
    /// were affected.
    async fn replace_with_summary(
        &self,
        summary: &Message,
        superseded: &[String],
        mode: SummaryMode,
    ) -> Result<usize, StoreError>;

    async fn list_archived_messages(&self, thread_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Ids of threads whose `updated_at` is older than `cutoff`.
    async fn list_threads_updated_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError>;
}
