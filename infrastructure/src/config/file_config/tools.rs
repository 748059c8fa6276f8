//! Tools configuration from TOML (`[tools]` section)
//!
//! Only tools named in `enabled` are registered at startup. Each tool keeps
//! its own sub-table:
//!
//! ```toml
//! [tools]
//! enabled = ["shell", "file_operations", "web_search"]
//!
//! [tools.shell]
//! allowed_commands = ["ls", "git"]
//! max_timeout_secs = 60
//!
//! [tools.files]
//! sandbox_root = "/srv/agent-workspace"
//! ```

use crate::tools::{FileToolConfig, ShellToolConfig};
#[cfg(feature = "web-tools")]
use crate::tools::web::{BrowserConfig, WebSearchConfig};
use serde::{Deserialize, Serialize};

pub const SHELL_TOOL: &str = "shell";
pub const FILE_TOOL: &str = "file_operations";
pub const WEB_SEARCH_TOOL: &str = "web_search";
pub const BROWSER_TOOL: &str = "browser_automation";

/// Every tool name this build knows how to construct.
pub fn known_tools() -> Vec<&'static str> {
    let mut names = vec![SHELL_TOOL, FILE_TOOL];
    if cfg!(feature = "web-tools") {
        names.extend([WEB_SEARCH_TOOL, BROWSER_TOOL]);
    }
    names
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolsConfig {
    /// Tool names to register (default: all known tools)
    pub enabled: Vec<String>,
    pub shell: ShellToolConfig,
    pub files: FileToolConfig,
    #[cfg(feature = "web-tools")]
    pub web_search: WebSearchConfig,
    #[cfg(feature = "web-tools")]
    pub browser: BrowserConfig,
}

impl Default for FileToolsConfig {
    fn default() -> Self {
        Self {
            enabled: known_tools().into_iter().map(String::from).collect(),
            shell: ShellToolConfig::default(),
            files: FileToolConfig::default(),
            #[cfg(feature = "web-tools")]
            web_search: WebSearchConfig::default(),
            #[cfg(feature = "web-tools")]
            browser: BrowserConfig::default(),
        }
    }
}

impl FileToolsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|n| n == name)
    }
}
