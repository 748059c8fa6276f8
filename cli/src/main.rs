//! CLI entrypoint for suna-agent
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use suna_infrastructure::{AppContext, ConfigLoader, FileConfig};
use suna_presentation::{AppState, Cli, Command, ConsoleFormatter};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };

    match cli.command() {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Tools { json } => list_tools(config, json).await,
        Command::Config { sources, check } => show_config(&cli, &config, sources, check),
    }
}

fn check_config(config: &FileConfig) -> Result<()> {
    let issues = config.validate();
    for issue in &issues {
        warn!(field = %issue.field, "{}", issue.message);
    }
    if FileConfig::has_errors(&issues) {
        eprint!("{}", ConsoleFormatter::format_issues(&issues));
        bail!("Invalid configuration");
    }
    Ok(())
}

async fn serve(mut config: FileConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    check_config(&config)?;

    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind_address()))?;

    info!("Starting suna-agent");

    // === Dependency Injection ===
    let ctx = AppContext::build(config).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal.cancel();
    });

    spawn_thread_cleanup(&ctx, shutdown.clone());

    let served = suna_presentation::serve(AppState::from(&ctx), addr, shutdown).await;
    ctx.shutdown().await;
    served.with_context(|| format!("HTTP server on {addr} failed"))
}

/// Hourly sweep of threads idle for longer than `threads.retention_days`.
fn spawn_thread_cleanup(ctx: &AppContext, shutdown: CancellationToken) {
    let retention_days = ctx.config.threads.retention_days;
    if retention_days == 0 {
        return;
    }
    let threads = ctx.threads.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {
                    if let Err(e) = threads.cleanup_old_threads(retention_days).await {
                        warn!(error = %e, "Thread cleanup failed");
                    }
                }
            }
        }
    });
}

async fn list_tools(config: FileConfig, json: bool) -> Result<()> {
    check_config(&config)?;
    let ctx = AppContext::build(config).await?;

    if json {
        let report = serde_json::json!({
            "stats": ctx.registry.stats(),
            "functions": ctx.registry.function_schemas(),
            "tags": ctx.registry.tag_schemas(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", ConsoleFormatter::format_tools(&ctx.registry.all_tools()));
    }

    ctx.shutdown().await;
    Ok(())
}

fn show_config(cli: &Cli, config: &FileConfig, sources: bool, check: bool) -> Result<()> {
    if sources {
        for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("{line}");
        }
        return Ok(());
    }

    let issues = config.validate();
    if !check {
        println!("{}", toml::to_string_pretty(config)?);
    }
    print!("{}", ConsoleFormatter::format_issues(&issues));
    if FileConfig::has_errors(&issues) {
        bail!("Invalid configuration");
    }
    Ok(())
}
