//! Application assembly from a [`FileConfig`]
//!
//! ```text
//! FileConfig ──▶ store (memory | sqlite)
//!            ──▶ cache (optional) ──▶ ThreadManager, SessionCache
//!            ──▶ ToolRegistry (enabled tools only)
//!            ──▶ OpenAiGateway
//!                       └──────────▶ ChatUseCase
//! ```

use crate::cache::MemoryCache;
use crate::config::{
    BROWSER_TOOL, FILE_TOOL, FileConfig, SHELL_TOOL, StoreBackend, WEB_SEARCH_TOOL, thread_params,
};
use crate::llm::OpenAiGateway;
use crate::store::{MemoryThreadStore, SqliteThreadStore};
use crate::tools::{FileTool, RegistrationOptions, ShellTool, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use suna_application::{
    CachePort, ChatUseCase, GatewayError, SessionCache, ThreadManager, ToolDispatchPort,
};
use suna_domain::{StoreError, ThreadRepository, Tool};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to open thread store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build LLM gateway: {0}")]
    Gateway(#[from] GatewayError),
}

/// Everything the HTTP layer needs, wired once at startup.
pub struct AppContext {
    pub config: FileConfig,
    pub threads: Arc<ThreadManager>,
    pub sessions: Arc<SessionCache>,
    pub registry: Arc<ToolRegistry>,
    pub chat: ChatUseCase,
}

impl AppContext {
    pub async fn build(config: FileConfig) -> Result<Self, BootstrapError> {
        let store: Arc<dyn ThreadRepository> = match config.store.backend {
            StoreBackend::Memory => Arc::new(MemoryThreadStore::new()),
            StoreBackend::Sqlite => Arc::new(SqliteThreadStore::open(&config.store.path)?),
        };

        let cache: Option<Arc<dyn CachePort>> = config
            .cache
            .enabled
            .then(|| Arc::new(MemoryCache::new()) as Arc<dyn CachePort>);

        let mut manager = ThreadManager::new(store)
            .with_params(thread_params(&config.cache, &config.threads));
        if let Some(cache) = &cache {
            manager = manager.with_cache(cache.clone());
        }
        let threads = Arc::new(manager);
        let sessions = Arc::new(SessionCache::new(
            cache,
            Duration::from_secs(config.cache.session_ttl_secs),
        ));

        let registry = Arc::new(ToolRegistry::new());
        register_enabled_tools(&registry, &config).await;

        let gateway = OpenAiGateway::new(
            &config.llm.base_url,
            config.llm.api_key(),
            Duration::from_secs(config.llm.timeout_secs),
        )?
        .with_aliases(config.llm.model_aliases.clone());
        if !gateway.has_api_key() {
            warn!(
                env = %config.llm.api_key_env,
                "No API key configured, chat requests will fail"
            );
        }

        let chat = ChatUseCase::new(
            threads.clone(),
            registry.clone() as Arc<dyn ToolDispatchPort>,
            Arc::new(gateway),
        )
        .with_params(config.llm.to_chat_params(&config.threads.default_title));

        info!(
            store = ?config.store.backend,
            cache = config.cache.enabled,
            tools = registry.stats().total_tools,
            model = %config.llm.model,
            "Application context ready"
        );

        Ok(Self {
            config,
            threads,
            sessions,
            registry,
            chat,
        })
    }

    /// Release tool resources. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.registry.clear_all().await;
    }
}

/// A tool that fails to initialize is skipped; the others still register.
async fn register_enabled_tools(registry: &ToolRegistry, config: &FileConfig) {
    let tools = &config.tools;
    let mut candidates: Vec<Box<dyn Tool>> = Vec::new();

    if tools.is_enabled(SHELL_TOOL) {
        candidates.push(Box::new(ShellTool::new(tools.shell.clone())));
    }
    if tools.is_enabled(FILE_TOOL) {
        candidates.push(Box::new(FileTool::new(tools.files.clone())));
    }
    #[cfg(feature = "web-tools")]
    {
        use crate::tools::web::{BrowserTool, WebSearchTool};
        if tools.is_enabled(WEB_SEARCH_TOOL) {
            candidates.push(Box::new(WebSearchTool::new(tools.web_search.clone())));
        }
        if tools.is_enabled(BROWSER_TOOL) {
            candidates.push(Box::new(BrowserTool::new(tools.browser.clone())));
        }
    }
    #[cfg(not(feature = "web-tools"))]
    {
        for name in [WEB_SEARCH_TOOL, BROWSER_TOOL] {
            if tools.is_enabled(name) {
                warn!(tool = name, "Tool requires the web-tools feature, skipping");
            }
        }
    }

    for tool in candidates {
        if let Err(e) = registry
            .register_boxed(tool, RegistrationOptions::default())
            .await
        {
            warn!(error = %e, "Tool disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> FileConfig {
        let mut config = FileConfig::default();
        config.tools.files.sandbox_root = dir.join("sandbox");
        config.tools.enabled = vec![SHELL_TOOL.into(), FILE_TOOL.into()];
        config
    }

    #[tokio::test]
    async fn test_build_registers_enabled_tools() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::build(config_in(dir.path())).await.unwrap();

        assert!(ctx.registry.has_function("execute"));
        assert!(ctx.registry.has_function("read_file"));
        assert!(!ctx.registry.has_function("web_search"));
        assert_eq!(ctx.registry.stats().total_tools, 2);

        ctx.shutdown().await;
        assert_eq!(ctx.registry.stats().total_tools, 0);
    }

    #[tokio::test]
    async fn test_build_with_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.store.backend = StoreBackend::Sqlite;
        config.store.path = dir.path().join("data").join("threads.db");
        config.tools.enabled.clear();

        let ctx = AppContext::build(config).await.unwrap();
        let thread = ctx
            .threads
            .create_thread(suna_domain::NewThread::new("alice"))
            .await
            .unwrap();
        assert!(ctx.threads.get_thread(&thread.thread_id).await.unwrap().is_some());
        assert!(dir.path().join("data").join("threads.db").exists());
    }

    #[tokio::test]
    async fn test_sessions_disabled_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.cache.enabled = false;
        config.tools.enabled.clear();

        let ctx = AppContext::build(config).await.unwrap();
        ctx.sessions.set("s1", &serde_json::json!({"a": 1})).await;
        assert_eq!(ctx.sessions.get("s1").await, None);
    }
}
