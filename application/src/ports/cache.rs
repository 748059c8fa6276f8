//! Cache port
//!
//! A best-effort, TTL-bounded key/value cache. Entries are derived views of
//! the store and never authoritative: callers treat every [`CacheError`] as
//! a miss.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by cache adapters.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("invalid cache pattern: {0}")]
    InvalidPattern(String),
}

/// Key/value cache with TTLs and glob-pattern deletion.
#[async_trait]
pub trait CachePort: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether the key was present.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete every key matching a glob pattern (`*`, `?`). Returns the count.
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError>;
}

/// Typed constructors for the cache keyspace.
///
/// | Key | Holds |
/// |-----|-------|
/// | `thread:<id>` | thread record |
/// | `messages:<id>` | full message list |
/// | `messages:<id>:<limit>` | first `limit` messages |
/// | `session:<id>` | session payload |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey<'a> {
    Thread(&'a str),
    Messages(&'a str, Option<usize>),
    Session(&'a str),
}

impl CacheKey<'_> {
    /// Pattern covering every parameterized message-list key of a thread.
    pub fn messages_pattern(thread_id: &str) -> String {
        format!("messages:{thread_id}:*")
    }
}

impl fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Thread(id) => write!(f, "thread:{id}"),
            CacheKey::Messages(id, None) => write!(f, "messages:{id}"),
            CacheKey::Messages(id, Some(limit)) => write!(f, "messages:{id}:{limit}"),
            CacheKey::Session(id) => write!(f, "session:{id}"),
        }
    }
}
