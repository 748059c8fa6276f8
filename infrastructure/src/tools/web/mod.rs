//! **Web Tools**: `web_search` and `browser_automation`
//!
//! Gated behind the `web-tools` Cargo feature flag (on by default).
//!
//! # Tools
//!
//! | Tool | Operations | Key Dependency |
//! |------|------------|----------------|
//! | `web_search` | `search`, `news_search`, `research` | `reqwest` |
//! | `browser_automation` | `navigate`, `extract_content`, plus four session-only operations | `reqwest` + `scraper` |
//!
//! # Feature Gate
//!
//! ```toml
//! # infrastructure/Cargo.toml
//! [features]
//! default = ["web-tools"]
//! web-tools = ["dep:scraper", "dep:lru"]
//!
//! # cli/Cargo.toml
//! [features]
//! default = ["web-tools"]
//! web-tools = ["suna-infrastructure/web-tools"]
//! ```
//!
//! `reqwest` itself is always compiled in because the LLM gateway needs it.

mod browser;
mod html;
mod search;

pub use browser::{BROWSER, BrowserConfig, BrowserTool};
pub use search::{
    DuckDuckGoProvider, SearchDepth, SearchHit, SearchOutcome, SearchProvider, SearchQuery,
    TavilyProvider, WEB_SEARCH, WebSearchConfig, WebSearchTool,
};
