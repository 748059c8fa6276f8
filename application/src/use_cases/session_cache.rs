//! Opaque per-session state kept only in the cache.
//!
//! Sessions have no authoritative store: a cache outage simply means the
//! session is gone. Every failure is logged and swallowed.

use crate::ports::cache::{CacheKey, CachePort};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct SessionCache {
    cache: Option<Arc<dyn CachePort>>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(cache: Option<Arc<dyn CachePort>>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub async fn set(&self, session_id: &str, data: &Value) {
        let Some(cache) = &self.cache else { return };
        let key = CacheKey::Session(session_id).to_string();
        let raw = match serde_json::to_string(data) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(session_id, error = %e, "Session data not serializable");
                return;
            }
        };
        if let Err(e) = cache.set(&key, raw, self.ttl).await {
            warn!(session_id, error = %e, "Failed to store session");
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<Value> {
        let cache = self.cache.as_ref()?;
        let key = CacheKey::Session(session_id).to_string();
        match cache.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .inspect_err(|e| warn!(session_id, error = %e, "Discarding corrupt session"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(session_id, error = %e, "Failed to read session");
                None
            }
        }
    }

    pub async fn delete(&self, session_id: &str) {
        let Some(cache) = &self.cache else { return };
        let key = CacheKey::Session(session_id).to_string();
        if let Err(e) = cache.delete(&key).await {
            warn!(session_id, error = %e, "Failed to delete session");
        }
    }
}
