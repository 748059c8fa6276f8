//! Thread manager use case
//!
//! Owns conversation persistence on top of a [`ThreadRepository`], with an
//! optional read-through [`CachePort`] in front of it.
//!
//! # Cache policy
//!
//! ```text
//! read:   cache ──hit──▶ return
//!           └──miss──▶ store ──▶ cache.set(ttl) ──▶ return
//! write:  store ──ok──▶ cache.delete(keys) ──▶ return
//! ```
//!
//! Writes invalidate, they never update cached values. Every cache failure
//! degrades to a miss; store failures are logged with the operation name and
//! identifiers (never message content) and propagated.

use crate::config::ThreadParams;
use crate::ports::cache::{CacheKey, CachePort};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use suna_domain::thread::{split_for_summary, summarize, summary_metadata};
use suna_domain::{
    AiMessage, Message, NewThread, Role, StoreError, SummaryMode, Thread, ThreadPatch,
    ThreadRepository, ThreadStats, ToolContext,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors returned by [`ThreadManager`].
#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ThreadError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ThreadNotFound(id) => ThreadError::ThreadNotFound(id),
            other => ThreadError::Store(other),
        }
    }
}

/// Result of a summarization pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryOutcome {
    /// The appended `system` message
    pub summary: Message,
    /// Number of older messages it replaces
    pub summarized: usize,
    pub mode: SummaryMode,
}

pub struct ThreadManager {
    store: Arc<dyn ThreadRepository>,
    cache: Option<Arc<dyn CachePort>>,
    params: ThreadParams,
}

impl ThreadManager {
    pub fn new(store: Arc<dyn ThreadRepository>) -> Self {
        Self {
            store,
            cache: None,
            params: ThreadParams::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CachePort>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_params(mut self, params: ThreadParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &ThreadParams {
        &self.params
    }

    // ==================== Threads ====================

    /// Persist a new thread. Never consults the cache.
    pub async fn create_thread(&self, config: NewThread) -> Result<Thread, ThreadError> {
        let start = Instant::now();
        let now = Utc::now();
        let thread = Thread {
            thread_id: uuid::Uuid::new_v4().to_string(),
            account_id: config.account_id,
            created_at: now,
            updated_at: now,
            title: config.title,
            metadata: config.metadata,
        };

        self.store
            .insert_thread(&thread)
            .await
            .inspect_err(|e| log_store_failure("create_thread", &thread.thread_id, e))?;

        info!(
            thread_id = %thread.thread_id,
            account_id = %thread.account_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Thread created"
        );
        Ok(thread)
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>, ThreadError> {
        let key = CacheKey::Thread(thread_id).to_string();
        if let Some(thread) = self.cache_get::<Thread>(&key).await {
            debug!(thread_id, "Thread cache hit");
            return Ok(Some(thread));
        }

        let thread = self
            .store
            .get_thread(thread_id)
            .await
            .inspect_err(|e| log_store_failure("get_thread", thread_id, e))?;

        if let Some(thread) = &thread {
            self.cache_set(&key, thread, self.params.thread_ttl).await;
        }
        Ok(thread)
    }

    pub async fn update_thread(
        &self,
        thread_id: &str,
        patch: ThreadPatch,
    ) -> Result<Option<Thread>, ThreadError> {
        let updated = self
            .store
            .update_thread(thread_id, &patch, Utc::now())
            .await
            .inspect_err(|e| log_store_failure("update_thread", thread_id, e))?;

        self.invalidate(&[CacheKey::Thread(thread_id).to_string()]).await;
        Ok(updated)
    }

    /// Delete a thread, its messages, and every cache key derived from it.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<bool, ThreadError> {
        let start = Instant::now();
        let existed = self
            .store
            .delete_thread(thread_id)
            .await
            .inspect_err(|e| log_store_failure("delete_thread", thread_id, e))?;

        self.invalidate_thread(thread_id).await;

        info!(
            thread_id,
            existed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Thread deleted"
        );
        Ok(existed)
    }

    /// Delete threads with no activity in the last `max_age_days` days.
    pub async fn cleanup_old_threads(&self, max_age_days: u32) -> Result<usize, ThreadError> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(max_age_days));
        let stale = self
            .store
            .list_threads_updated_before(cutoff)
            .await
            .inspect_err(|e| log_store_failure("cleanup_old_threads", "*", e))?;

        let mut removed = 0;
        for thread_id in &stale {
            if self.delete_thread(thread_id).await? {
                removed += 1;
            }
        }

        info!(removed, max_age_days, "Old threads cleaned up");
        Ok(removed)
    }

    // ==================== Messages ====================

    /// Live messages in creation order; the first `limit` when given.
    pub async fn get_messages(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, ThreadError> {
        let key = CacheKey::Messages(thread_id, limit).to_string();
        if let Some(messages) = self.cache_get::<Vec<Message>>(&key).await {
            debug!(thread_id, count = messages.len(), "Messages cache hit");
            return Ok(messages);
        }

        let messages = self
            .store
            .list_messages(thread_id, limit)
            .await
            .inspect_err(|e| log_store_failure("get_messages", thread_id, e))?;

        self.cache_set(&key, &messages, self.params.messages_ttl).await;
        Ok(messages)
    }

    pub async fn add_message(
        &self,
        thread_id: &str,
        role: Role,
        content: impl Into<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Message, ThreadError> {
        let start = Instant::now();
        let message = new_message(thread_id, role, content.into(), metadata);

        self.store
            .insert_message(&message)
            .await
            .inspect_err(|e| log_store_failure("add_message", thread_id, e))?;

        self.invalidate_thread(thread_id).await;

        debug!(
            thread_id,
            message_id = %message.message_id,
            role = %role,
            content_len = message.content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Message added"
        );
        Ok(message)
    }

    /// Merge a metadata patch into one message (e.g. usage after a stream finishes).
    pub async fn update_message_metadata(
        &self,
        thread_id: &str,
        message_id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Message>, ThreadError> {
        let updated = self
            .store
            .update_message_metadata(thread_id, message_id, &patch, Utc::now())
            .await
            .inspect_err(|e| log_store_failure("update_message_metadata", thread_id, e))?;

        self.invalidate_messages(thread_id).await;
        Ok(updated)
    }

    /// Model-facing view: role, content, metadata, in creation order.
    pub async fn get_messages_for_ai(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AiMessage>, ThreadError> {
        Ok(self
            .get_messages(thread_id, limit)
            .await?
            .into_iter()
            .map(AiMessage::from)
            .collect())
    }

    /// Messages superseded by an archiving summary.
    pub async fn get_archived_messages(&self, thread_id: &str) -> Result<Vec<Message>, ThreadError> {
        Ok(self
            .store
            .list_archived_messages(thread_id)
            .await
            .inspect_err(|e| log_store_failure("get_archived_messages", thread_id, e))?)
    }

    /// Collapse everything but the `keep_recent` newest messages into one
    /// appended `system` message. Returns `None` when the thread is short enough.
    ///
    /// The superseded messages are archived or deleted per [`ThreadParams::summary_mode`].
    pub async fn summarize_old_messages(
        &self,
        thread_id: &str,
        keep_recent: usize,
    ) -> Result<Option<SummaryOutcome>, ThreadError> {
        let start = Instant::now();
        let messages = self
            .store
            .list_messages(thread_id, None)
            .await
            .inspect_err(|e| log_store_failure("summarize_messages", thread_id, e))?;

        let Some((old, _recent)) = split_for_summary(&messages, keep_recent) else {
            return Ok(None);
        };

        let mode = self.params.summary_mode;
        let old_ids: Vec<String> = old.iter().map(|m| m.message_id.clone()).collect();
        let text = summarize(old);

        let summary = new_message(
            thread_id,
            Role::System,
            text,
            Some(summary_metadata(old.len(), mode)),
        );
        let affected = self
            .store
            .replace_with_summary(&summary, &old_ids, mode)
            .await
            .inspect_err(|e| log_store_failure("summarize_messages", thread_id, e))?;

        self.invalidate_thread(thread_id).await;

        info!(
            thread_id,
            summarized = old_ids.len(),
            affected,
            mode = mode.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Old messages summarized"
        );
        Ok(Some(SummaryOutcome {
            summary,
            summarized: old_ids.len(),
            mode,
        }))
    }

    /// Per-role counts; `None` for an unknown thread.
    pub async fn get_thread_stats(&self, thread_id: &str) -> Result<Option<ThreadStats>, ThreadError> {
        let Some(thread) = self.get_thread(thread_id).await? else {
            return Ok(None);
        };
        let messages = self.get_messages(thread_id, None).await?;
        Ok(Some(ThreadStats::compute(&thread, &messages)))
    }

    /// Build the per-request tool context. No I/O.
    pub fn get_thread_context(
        &self,
        thread_id: &str,
        user_id: &str,
        request_id: Option<&str>,
    ) -> ToolContext {
        let mut context = ToolContext::new(user_id, thread_id);
        context.request_id = request_id.map(str::to_string);
        context
            .metadata
            .insert("timestamp".into(), Value::from(Utc::now().to_rfc3339()));
        context
    }

    // ==================== Cache helpers ====================

    async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn cache_set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(cache) = &self.cache else { return };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Cache value could not be encoded");
                return;
            }
        };
        if let Err(e) = cache.set(key, raw, ttl).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    async fn invalidate(&self, keys: &[String]) {
        let Some(cache) = &self.cache else { return };
        for key in keys {
            if let Err(e) = cache.delete(key).await {
                warn!(key = %key, error = %e, "Cache invalidation failed");
            }
        }
    }

    async fn invalidate_messages(&self, thread_id: &str) {
        self.invalidate(&[CacheKey::Messages(thread_id, None).to_string()])
            .await;
        if let Some(cache) = &self.cache {
            let pattern = CacheKey::messages_pattern(thread_id);
            if let Err(e) = cache.delete_pattern(&pattern).await {
                warn!(pattern = %pattern, error = %e, "Cache pattern invalidation failed");
            }
        }
    }

    async fn invalidate_thread(&self, thread_id: &str) {
        self.invalidate(&[CacheKey::Thread(thread_id).to_string()])
            .await;
        self.invalidate_messages(thread_id).await;
    }
}

fn new_message(
    thread_id: &str,
    role: Role,
    content: String,
    metadata: Option<Map<String, Value>>,
) -> Message {
    let now = Utc::now();
    Message {
        message_id: uuid::Uuid::new_v4().to_string(),
        thread_id: thread_id.to_string(),
        role,
        content,
        metadata,
        created_at: now,
        updated_at: now,
    }
}

fn log_store_failure(operation: &'static str, thread_id: &str, err: &StoreError) {
    error!(operation, thread_id, error = %err, "Thread store operation failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{FailingCache, RecordingCache, TestStore};
    use serde_json::json;

    fn manager() -> (ThreadManager, Arc<RecordingCache>) {
        let cache = Arc::new(RecordingCache::default());
        let manager = ThreadManager::new(Arc::new(TestStore::default())).with_cache(cache.clone());
        (manager, cache)
    }

    #[tokio::test]
    async fn test_thread_stats_scenario() {
        let (manager, _) = manager();
        let thread = manager.create_thread(NewThread::new("u1")).await.unwrap();
        manager
            .add_message(&thread.thread_id, Role::User, "hello", None)
            .await
            .unwrap();
        manager
            .add_message(&thread.thread_id, Role::Assistant, "hi", None)
            .await
            .unwrap();

        let stats = manager
            .get_thread_stats(&thread.thread_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.user_messages, 1);
        assert_eq!(stats.assistant_messages, 1);

        assert!(manager.get_thread_stats("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_message_invalidates_cached_list() {
        let (manager, cache) = manager();
        let thread = manager.create_thread(NewThread::new("u1")).await.unwrap();
        let id = &thread.thread_id;

        manager.add_message(id, Role::User, "one", None).await.unwrap();
        assert_eq!(manager.get_messages(id, None).await.unwrap().len(), 1);
        assert_eq!(manager.get_messages(id, Some(5)).await.unwrap().len(), 1);
        assert!(cache.contains(&format!("messages:{id}")));
        assert!(cache.contains(&format!("messages:{id}:5")));

        manager.add_message(id, Role::Assistant, "two", None).await.unwrap();
        assert!(!cache.contains(&format!("messages:{id}")));
        assert!(!cache.contains(&format!("messages:{id}:5")));

        let messages = manager.get_messages(id, None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "two");
        assert_eq!(manager.get_messages(id, Some(5)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_thread_reads_through() {
        let (manager, cache) = manager();
        let thread = manager.create_thread(NewThread::new("u1")).await.unwrap();
        assert!(!cache.contains(&format!("thread:{}", thread.thread_id)));

        let fetched = manager.get_thread(&thread.thread_id).await.unwrap().unwrap();
        assert_eq!(fetched, thread);
        assert!(cache.contains(&format!("thread:{}", thread.thread_id)));

        let patched = manager
            .update_thread(
                &thread.thread_id,
                ThreadPatch {
                    title: Some("Renamed".into()),
                    metadata: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patched.title.as_deref(), Some("Renamed"));
        let fetched = manager.get_thread(&thread.thread_id).await.unwrap().unwrap();
        assert_eq!(fetched.title.as_deref(), Some("Renamed"));
    }

    #[tokio::test]
    async fn test_messages_for_ai_preserve_order() {
        let (manager, _) = manager();
        let thread = manager.create_thread(NewThread::new("u1")).await.unwrap();
        let script = [
            (Role::User, "a"),
            (Role::Assistant, "b"),
            (Role::User, "c"),
            (Role::Tool, "d"),
            (Role::Assistant, "e"),
        ];
        for (role, content) in script {
            manager
                .add_message(&thread.thread_id, role, content, None)
                .await
                .unwrap();
        }

        let view = manager
            .get_messages_for_ai(&thread.thread_id, None)
            .await
            .unwrap();
        assert_eq!(view.len(), script.len());
        for (entry, (role, content)) in view.iter().zip(script) {
            assert_eq!(entry.role, role);
            assert_eq!(entry.content, content);
        }
    }

    #[tokio::test]
    async fn test_cache_failure_degrades_to_miss() {
        let manager =
            ThreadManager::new(Arc::new(TestStore::default())).with_cache(Arc::new(FailingCache));
        let thread = manager.create_thread(NewThread::new("u1")).await.unwrap();
        manager
            .add_message(&thread.thread_id, Role::User, "still works", None)
            .await
            .unwrap();
        assert_eq!(manager.get_messages(&thread.thread_id, None).await.unwrap().len(), 1);
        assert!(manager.get_thread(&thread.thread_id).await.unwrap().is_some());
        assert!(manager.delete_thread(&thread.thread_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let manager = ThreadManager::new(Arc::new(TestStore::failing()));
        let err = manager.create_thread(NewThread::new("u1")).await.unwrap_err();
        assert!(matches!(err, ThreadError::Store(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_add_message_to_unknown_thread() {
        let (manager, _) = manager();
        let err = manager
            .add_message("nope", Role::User, "hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ThreadError::ThreadNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_thread_purges_parameterized_keys() {
        let (manager, cache) = manager();
        let thread = manager.create_thread(NewThread::new("u1")).await.unwrap();
        let id = thread.thread_id.clone();
        manager.add_message(&id, Role::User, "x", None).await.unwrap();
        manager.get_thread(&id).await.unwrap();
        manager.get_messages(&id, None).await.unwrap();
        manager.get_messages(&id, Some(10)).await.unwrap();
        manager.get_messages(&id, Some(50)).await.unwrap();

        assert!(manager.delete_thread(&id).await.unwrap());
        assert!(cache.keys_with_prefix(&format!("messages:{id}")).is_empty());
        assert!(!cache.contains(&format!("thread:{id}")));
        assert!(manager.get_thread(&id).await.unwrap().is_none());
        assert!(manager.get_messages(&id, None).await.unwrap().is_empty());
        assert!(!manager.delete_thread(&id).await.unwrap());
    }

    async fn seeded(manager: &ThreadManager, count: usize) -> (String, Vec<Message>) {
        let thread = manager.create_thread(NewThread::new("u1")).await.unwrap();
        let mut added = Vec::new();
        for i in 0..count {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            added.push(
                manager
                    .add_message(&thread.thread_id, role, format!("message {i}"), None)
                    .await
                    .unwrap(),
            );
        }
        (thread.thread_id, added)
    }

    #[tokio::test]
    async fn test_summarize_archive_mode() {
        let (manager, _) = manager();
        let (id, added) = seeded(&manager, 15).await;

        let outcome = manager.summarize_old_messages(&id, 10).await.unwrap().unwrap();
        assert_eq!(outcome.summarized, 5);
        assert_eq!(outcome.mode, SummaryMode::Archive);
        assert_eq!(outcome.summary.role, Role::System);
        assert!(outcome.summary.content.contains("3 user messages and 2 assistant responses"));
        assert_eq!(outcome.summary.metadata.as_ref().unwrap()["originalMessageCount"], 5);

        let live = manager.get_messages(&id, None).await.unwrap();
        assert_eq!(live.len(), 11);
        assert_eq!(&live[..10], &added[5..]);
        assert_eq!(live[10].message_id, outcome.summary.message_id);

        let archived = manager.get_archived_messages(&id).await.unwrap();
        assert_eq!(archived.len(), 5);
        assert_eq!(archived[0].content, "message 0");
    }

    #[tokio::test]
    async fn test_summarize_delete_mode() {
        let cache = Arc::new(RecordingCache::default());
        let manager = ThreadManager::new(Arc::new(TestStore::default()))
            .with_cache(cache)
            .with_params(ThreadParams::default().with_summary_mode(SummaryMode::Delete));
        let (id, added) = seeded(&manager, 15).await;

        let outcome = manager.summarize_old_messages(&id, 10).await.unwrap().unwrap();
        assert_eq!(outcome.mode, SummaryMode::Delete);

        let live = manager.get_messages(&id, None).await.unwrap();
        assert_eq!(live.len(), 11);
        assert_eq!(&live[..10], &added[5..]);
        assert!(manager.get_archived_messages(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_summary_leaves_history_unchanged() {
        let store = Arc::new(TestStore::default());
        let manager = ThreadManager::new(store.clone())
            .with_cache(Arc::new(RecordingCache::default()));
        let (id, added) = seeded(&manager, 15).await;
        let before = manager.get_messages_for_ai(&id, None).await.unwrap();

        store.fail_summaries();
        let err = manager.summarize_old_messages(&id, 10).await.unwrap_err();
        assert!(matches!(err, ThreadError::Store(StoreError::Backend(_))));

        let after = manager.get_messages_for_ai(&id, None).await.unwrap();
        assert_eq!(after, before);
        assert!(after.iter().all(|m| m.role != Role::System));
        assert_eq!(manager.get_messages(&id, None).await.unwrap(), added);
        assert!(manager.get_archived_messages(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summarize_short_thread_is_noop() {
        let (manager, _) = manager();
        let (id, _) = seeded(&manager, 4).await;
        assert!(manager.summarize_old_messages(&id, 10).await.unwrap().is_none());
        assert_eq!(manager.get_messages(&id, None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_update_message_metadata_visible_after_cache() {
        let (manager, _) = manager();
        let (id, added) = seeded(&manager, 1).await;
        manager.get_messages(&id, None).await.unwrap();

        let mut patch = Map::new();
        patch.insert("finishReason".into(), json!("stop"));
        manager
            .update_message_metadata(&id, &added[0].message_id, patch)
            .await
            .unwrap()
            .unwrap();

        let messages = manager.get_messages(&id, None).await.unwrap();
        assert_eq!(messages[0].metadata.as_ref().unwrap()["finishReason"], "stop");
    }

    #[tokio::test]
    async fn test_thread_context_is_pure() {
        let (manager, cache) = manager();
        let context = manager.get_thread_context("t1", "u1", Some("req-1"));
        assert_eq!(context.thread_id, "t1");
        assert_eq!(context.user_id, "u1");
        assert_eq!(context.request_id.as_deref(), Some("req-1"));
        assert!(context.metadata.contains_key("timestamp"));
        assert!(cache.keys_with_prefix("").is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_old_threads() {
        let (manager, _) = manager();
        let (id, _) = seeded(&manager, 2).await;
        assert_eq!(manager.cleanup_old_threads(1).await.unwrap(), 0);
        assert!(manager.get_thread(&id).await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(manager.cleanup_old_threads(0).await.unwrap(), 1);
        assert!(manager.get_thread(&id).await.unwrap().is_none());
    }
}
