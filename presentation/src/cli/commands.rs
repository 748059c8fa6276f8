//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for suna-agent
#[derive(Parser, Debug)]
#[command(name = "suna-agent")]
#[command(author, version, about = "Tool-using chat agent with persistent threads")]
#[command(long_about = r#"
Suna runs an HTTP chat service backed by an LLM that can call tools
(shell commands, sandboxed files, web search, page extraction).

Configuration files are loaded from (in priority order):
1. SUNA_* environment variables, e.g. SUNA_SERVER__PORT=8080
2. --config <path>     Explicit config file
3. ./suna.toml         Project-level config
4. ~/.config/suna-agent/config.toml   Global config

Example:
  suna-agent serve --port 8080
  suna-agent tools --json
  suna-agent config --sources
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,
        /// Override `server.port`
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the tools and operations that would be registered
    Tools {
        /// Print registry stats and schemas as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Show configuration file locations instead
        #[arg(long)]
        sources: bool,
        /// Only validate; exit non-zero on errors
        #[arg(long)]
        check: bool,
    },
}

impl Cli {
    /// The subcommand to run; no subcommand means `serve`.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            host: None,
            port: None,
        })
    }
}
