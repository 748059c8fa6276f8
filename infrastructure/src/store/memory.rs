//! Process-local thread store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use suna_domain::{Message, StoreError, SummaryMode, Thread, ThreadPatch, ThreadRepository};

struct Stored {
    message: Message,
    archived: bool,
}

#[derive(Default)]
struct State {
    threads: HashMap<String, Thread>,
    /// Per thread, in insertion order
    messages: HashMap<String, Vec<Stored>>,
}

/// [`ThreadRepository`] held entirely in memory. Lost on restart.
#[derive(Default)]
pub struct MemoryThreadStore {
    state: Mutex<State>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Memory store mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Creation order; the sort is stable so equal timestamps keep insertion order.
fn ordered<'a>(stored: impl Iterator<Item = &'a Stored>) -> Vec<Message> {
    let mut messages: Vec<Message> = stored.map(|s| s.message.clone()).collect();
    messages.sort_by_key(|m| m.created_at);
    messages
}

impl State {
    fn contains_message(&self, message_id: &str) -> bool {
        self.messages
            .values()
            .flatten()
            .any(|s| s.message.message_id == message_id)
    }

    /// Checks shared by every append; nothing is changed on error.
    fn check_insert(&self, message: &Message) -> Result<(), StoreError> {
        if !self.threads.contains_key(&message.thread_id) {
            return Err(StoreError::ThreadNotFound(message.thread_id.clone()));
        }
        if self.contains_message(&message.message_id) {
            return Err(StoreError::DuplicateMessage(message.message_id.clone()));
        }
        Ok(())
    }

    fn push(&mut self, message: &Message) {
        if let Some(thread) = self.threads.get_mut(&message.thread_id) {
            thread.updated_at = thread.updated_at.max(message.created_at);
        }
        self.messages
            .entry(message.thread_id.clone())
            .or_default()
            .push(Stored {
                message: message.clone(),
                archived: false,
            });
    }
}

#[async_trait]
impl ThreadRepository for MemoryThreadStore {
    async fn insert_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.threads.insert(thread.thread_id.clone(), thread.clone());
        state.messages.entry(thread.thread_id.clone()).or_default();
        Ok(())
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>, StoreError> {
        Ok(self.lock().threads.get(thread_id).cloned())
    }

    async fn update_thread(
        &self,
        thread_id: &str,
        patch: &ThreadPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Thread>, StoreError> {
        let mut state = self.lock();
        Ok(state.threads.get_mut(thread_id).map(|thread| {
            if let Some(title) = &patch.title {
                thread.title = Some(title.clone());
            }
            if let Some(metadata) = &patch.metadata {
                thread.metadata = Some(metadata.clone());
            }
            thread.updated_at = updated_at;
            thread.clone()
        }))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        state.messages.remove(thread_id);
        Ok(state.threads.remove(thread_id).is_some())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.check_insert(message)?;
        state.push(message);
        Ok(())
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StoreError> {
        let state = self.lock();
        let Some(stored) = state.messages.get(thread_id) else {
            return Ok(Vec::new());
        };
        let mut messages = ordered(stored.iter().filter(|s| !s.archived));
        if let Some(limit) = limit {
            messages.truncate(limit);
        }
        Ok(messages)
    }

    async fn update_message_metadata(
        &self,
        thread_id: &str,
        message_id: &str,
        patch: &Map<String, Value>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Message>, StoreError> {
        let mut state = self.lock();
        let found = state
            .messages
            .get_mut(thread_id)
            .and_then(|stored| stored.iter_mut().find(|s| s.message.message_id == message_id));
        Ok(found.map(|s| {
            let metadata = s.message.metadata.get_or_insert_with(Map::new);
            metadata.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
            s.message.updated_at = updated_at;
            s.message.clone()
        }))
    }

    async fn replace_with_summary(
        &self,
        summary: &Message,
        superseded: &[String],
        mode: SummaryMode,
    ) -> Result<usize, StoreError> {
        let mut state = self.lock();
        state.check_insert(summary)?;

        let stored = state.messages.entry(summary.thread_id.clone()).or_default();
        let affected = match mode {
            SummaryMode::Archive => {
                let mut archived = 0;
                for s in stored
                    .iter_mut()
                    .filter(|s| !s.archived && superseded.contains(&s.message.message_id))
                {
                    s.archived = true;
                    archived += 1;
                }
                archived
            }
            SummaryMode::Delete => {
                let before = stored.len();
                stored.retain(|s| !superseded.contains(&s.message.message_id));
                before - stored.len()
            }
        };
        state.push(summary);
        Ok(affected)
    }

    async fn list_archived_messages(&self, thread_id: &str) -> Result<Vec<Message>, StoreError> {
        let state = self.lock();
        Ok(state
            .messages
            .get(thread_id)
            .map(|stored| ordered(stored.iter().filter(|s| s.archived)))
            .unwrap_or_default())
    }

    async fn list_threads_updated_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let state = self.lock();
        Ok(state
            .threads
            .values()
            .filter(|t| t.updated_at < cutoff)
            .map(|t| t.thread_id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;

    #[tokio::test]
    async fn test_conformance() {
        conformance::run_all(&MemoryThreadStore::new()).await;
    }
}
