//! Persistence configuration: `[store]`, `[cache]` and `[threads]` sections

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use suna_application::ThreadParams;
use suna_domain::SummaryMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    pub backend: StoreBackend,
    /// Database file for the `sqlite` backend
    pub path: PathBuf,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("suna.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCacheConfig {
    pub enabled: bool,
    pub thread_ttl_secs: u64,
    pub messages_ttl_secs: u64,
    pub session_ttl_secs: u64,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            thread_ttl_secs: 300,
            messages_ttl_secs: 120,
            session_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileThreadsConfig {
    /// What happens to messages a summary replaces
    pub summary_mode: SummaryMode,
    /// Title of threads a chat request creates implicitly
    pub default_title: String,
    /// Threads idle for longer than this are swept hourly; 0 disables
    pub retention_days: u32,
}

impl Default for FileThreadsConfig {
    fn default() -> Self {
        Self {
            summary_mode: SummaryMode::Archive,
            default_title: "New Conversation".to_string(),
            retention_days: 30,
        }
    }
}

/// Combine `[cache]` and `[threads]` into the thread manager's parameters.
pub fn thread_params(cache: &FileCacheConfig, threads: &FileThreadsConfig) -> ThreadParams {
    ThreadParams::default()
        .with_thread_ttl(Duration::from_secs(cache.thread_ttl_secs))
        .with_messages_ttl(Duration::from_secs(cache.messages_ttl_secs))
        .with_session_ttl(Duration::from_secs(cache.session_ttl_secs))
        .with_summary_mode(threads.summary_mode)
}
