//! Configuration file loading for suna-agent
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `SUNA_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./suna.toml` or `./.suna.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/suna-agent/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    BROWSER_TOOL, ConfigIssue, FILE_TOOL, FileCacheConfig, FileConfig, FileLlmConfig,
    FileServerConfig, FileStoreConfig, FileThreadsConfig, FileToolsConfig, SHELL_TOOL, Severity,
    StoreBackend, WEB_SEARCH_TOOL, known_tools, thread_params,
};
pub use loader::{ConfigError, ConfigLoader};
