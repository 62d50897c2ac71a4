//! sheetcache CLI - drives the offline layer against the real network and
//! the on-disk store.

mod args;
mod commands;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::{Cli, Commands};
use sheetcache_core::Config;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    info!(version = %config.version, scope = %config.scope, "sheetcache starting");

    match cli.command {
        Commands::Install { activate } => commands::install(&config, activate).await,
        Commands::Activate => commands::activate(&config).await,
        Commands::Fetch { urls, navigate } => commands::fetch(&config, &urls, navigate).await,
        Commands::Stores => commands::stores(&config),
    }
}
