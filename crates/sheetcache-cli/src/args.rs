//! CLI argument definitions using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// sheetcache - offline layer for spreadsheet lookup pages
///
/// Installs and activates versioned offline stores and pushes requests
/// through the same caching strategies the page uses.
#[derive(Parser, Debug)]
#[command(name = "sheetcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHEETCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cache every core asset for the configured version
    Install {
        /// Activate right away instead of waiting
        #[arg(long)]
        activate: bool,
    },

    /// Purge stores from other versions and take over
    Activate,

    /// Send requests through the interception layer
    Fetch {
        /// Absolute URLs, or paths relative to the configured scope
        #[arg(required = true)]
        urls: Vec<String>,

        /// Treat the requests as page navigations
        #[arg(long)]
        navigate: bool,
    },

    /// List stores and their entries
    Stores,
}
