//! Thread manager parameters: cache lifetimes and summarization policy.

use std::time::Duration;
use suna_domain::SummaryMode;

/// Controls how [`ThreadManager`](crate::use_cases::thread_manager::ThreadManager)
/// caches and compacts conversations.
///
/// | Key | Default |
/// |-----|---------|
/// | `thread_ttl` | 300 s |
/// | `messages_ttl` | 120 s |
/// | `session_ttl` | 3600 s |
/// | `summary_mode` | `Archive` |
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadParams {
    pub thread_ttl: Duration,
    pub messages_ttl: Duration,
    pub session_ttl: Duration,
    pub summary_mode: SummaryMode,
}

impl Default for ThreadParams {
    fn default() -> Self {
        Self {
            thread_ttl: Duration::from_secs(300),
            messages_ttl: Duration::from_secs(120),
            session_ttl: Duration::from_secs(3600),
            summary_mode: SummaryMode::Archive,
        }
    }
}

impl ThreadParams {
    pub fn with_thread_ttl(mut self, ttl: Duration) -> Self {
        self.thread_ttl = ttl;
        self
    }

    pub fn with_messages_ttl(mut self, ttl: Duration) -> Self {
        self.messages_ttl = ttl;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_summary_mode(mut self, mode: SummaryMode) -> Self {
        self.summary_mode = mode;
        self
    }
}
