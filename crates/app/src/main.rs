//! Passage - command-line client for a token-based auth API
//!
//! Wires the adapters to the session controller, restores any persisted
//! session and runs one command.

mod commands;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use commands::Commands;
use passage_application::{ApiClient, KeyValueStore, SessionController, TokenStore};
use passage_infrastructure::{ClientConfig, FileKeyValueStore, MemoryKeyValueStore, ReqwestTransport};
use terminal::{TerminalNavigator, TerminalNotifier};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "passage")]
#[command(about = "Log in to an auth API and keep the session alive")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "PASSAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Set logging level (overrides RUST_LOG)
    #[arg(short = 'l', long, global = true)]
    log_level: Option<LogLevel>,

    /// Keep the session in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let config = ClientConfig::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!(api = %config.api_base_url, storage = %config.storage_dir.display(), "configuration loaded");

    let session = build_session(&config, cli.ephemeral)?;
    session.try_auto_login().await;

    cli.command.execute(&session).await
}

fn init_tracing(level: Option<LogLevel>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_session(config: &ClientConfig, ephemeral: bool) -> Result<SessionController> {
    let storage: Arc<dyn KeyValueStore> = if ephemeral {
        Arc::new(MemoryKeyValueStore::new())
    } else {
        Arc::new(FileKeyValueStore::new(&config.storage_dir))
    };
    let transport = Arc::new(ReqwestTransport::new(config).context("building HTTP client")?);
    let tokens = Arc::new(TokenStore::new(storage));
    let navigator = Arc::new(TerminalNavigator);

    let client = Arc::new(ApiClient::new(
        transport,
        tokens,
        navigator.clone(),
        Arc::new(TerminalNotifier),
    ));
    Ok(SessionController::new(client, navigator).with_logout_timeout(config.logout_timeout()))
}
