//! Infrastructure layer for suna-agent
//!
//! Adapters that implement the ports defined in the domain and application
//! layers, plus configuration loading and application assembly.
//!
//! | Module | Provides |
//! |--------|----------|
//! | [`store`] | `ThreadRepository` over memory or SQLite |
//! | [`cache`] | in-process TTL `CachePort` |
//! | [`llm`] | OpenAI-compatible `LlmGateway` |
//! | [`tools`] | registry plus shell, file and web tools |
//! | [`config`] | layered TOML/env configuration |

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod llm;
pub mod store;
pub mod tools;

// Re-export commonly used types
pub use bootstrap::{AppContext, BootstrapError};
pub use cache::MemoryCache;
pub use config::{ConfigError, ConfigIssue, ConfigLoader, FileConfig, Severity};
pub use llm::OpenAiGateway;
pub use store::{MemoryThreadStore, SqliteThreadStore};
pub use tools::{RegistrationOptions, ToolRegistry};
