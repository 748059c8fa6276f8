//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every section is optional; missing keys fall back to their defaults.
//!
//! | Section | Type |
//! |---------|------|
//! | `[server]` | [`FileServerConfig`] |
//! | `[llm]` | [`FileLlmConfig`] |
//! | `[store]` | [`FileStoreConfig`] |
//! | `[cache]` | [`FileCacheConfig`] |
//! | `[threads]` | [`FileThreadsConfig`] |
//! | `[tools]` | [`FileToolsConfig`] |

mod llm;
mod server;
mod storage;
mod tools;

pub use llm::FileLlmConfig;
pub use server::FileServerConfig;
pub use storage::{
    FileCacheConfig, FileStoreConfig, FileThreadsConfig, StoreBackend, thread_params,
};
pub use tools::{
    BROWSER_TOOL, FILE_TOOL, FileToolsConfig, SHELL_TOOL, WEB_SEARCH_TOOL, known_tools,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: FileServerConfig,
    pub llm: FileLlmConfig,
    pub store: FileStoreConfig,
    pub cache: FileCacheConfig,
    pub threads: FileThreadsConfig,
    pub tools: FileToolsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Startup continues; the value is used as-is or ignored
    Warning,
    /// Startup must be refused
    Error,
}

/// One problem found by [`FileConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    pub severity: Severity,
    /// Dotted key path, e.g. `server.port`
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.field, self.message)
    }
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Nothing short-circuits: a config with three problems reports three.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue::error("server.port", "port must be non-zero"));
        }
        if self.server.host.trim().is_empty() {
            issues.push(ConfigIssue::error("server.host", "host must not be empty"));
        }

        if self.llm.model.trim().is_empty() {
            issues.push(ConfigIssue::error("llm.model", "model name must not be empty"));
        }
        if self.llm.max_tool_steps == 0 {
            issues.push(ConfigIssue::error(
                "llm.max_tool_steps",
                "at least one model round-trip is required",
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            issues.push(ConfigIssue::warning(
                "llm.temperature",
                format!("{} is outside the usual 0.0..=2.0 range", self.llm.temperature),
            ));
        }
        if self.llm.summarize_keep_recent == Some(0) {
            issues.push(ConfigIssue::error(
                "llm.summarize_keep_recent",
                "must keep at least one recent message",
            ));
        }

        if self.cache.enabled {
            for (field, ttl) in [
                ("cache.thread_ttl_secs", self.cache.thread_ttl_secs),
                ("cache.messages_ttl_secs", self.cache.messages_ttl_secs),
                ("cache.session_ttl_secs", self.cache.session_ttl_secs),
            ] {
                if ttl == 0 {
                    issues.push(ConfigIssue::error(
                        field,
                        "TTL must be positive while the cache is enabled",
                    ));
                }
            }
        }

        if self.store.backend == StoreBackend::Sqlite && self.store.path.as_os_str().is_empty() {
            issues.push(ConfigIssue::error("store.path", "sqlite backend needs a path"));
        }

        let known = known_tools();
        for name in &self.tools.enabled {
            if !known.contains(&name.as_str()) {
                issues.push(ConfigIssue::warning(
                    "tools.enabled",
                    format!("unknown tool '{name}' is ignored"),
                ));
            }
        }
        if self.tools.is_enabled(SHELL_TOOL) && self.tools.shell.allowed_commands.is_empty() {
            issues.push(ConfigIssue::warning(
                "tools.shell.allowed_commands",
                "empty allow-list, every command will be refused",
            ));
        }
        if self.tools.shell.default_timeout_secs > self.tools.shell.max_timeout_secs {
            issues.push(ConfigIssue::warning(
                "tools.shell.default_timeout_secs",
                "exceeds max_timeout_secs and will be capped",
            ));
        }
        if self.tools.is_enabled(FILE_TOOL) && !self.tools.files.sandbox_root.is_absolute() {
            issues.push(ConfigIssue::error(
                "tools.files.sandbox_root",
                "sandbox root must be an absolute path",
            ));
        }

        issues
    }

    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == Severity::Error)
    }
}
