//! # tabsync
//!
//! CLI tool for inspecting and maintaining tabsync session stores.
//!
//! The CLI works on JSON snapshots of a sync store. It associates as its own
//! device, so a snapshot written back with `--write` carries a header for
//! the CLI's machine tag.
//!
//! ## Commands
//!
//! - `init`: Create an empty store snapshot
//! - `inspect`: Show every foreign session in a snapshot
//! - `sweep`: Delete stale foreign sessions
//! - `delete`: Delete one foreign session
//! - `config`: Print the effective configuration
//!
//! ## Example
//!
//! ```bash
//! tabsync init store.json
//! tabsync inspect store.json
//! tabsync sweep store.json --threshold-days 30 --write
//! tabsync delete store.json session_sync1234 --write
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;
mod snapshot;

use commands::{delete, init, inspect, show_config, sweep};

/// CLI tool for inspecting and maintaining tabsync session stores.
#[derive(Parser, Debug)]
#[command(name = "tabsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty store snapshot with a sessions root
    Init {
        /// Snapshot file to create
        snapshot: PathBuf,

        /// Cache GUID of the new store (random if omitted)
        #[arg(long)]
        cache_guid: Option<String>,
    },

    /// Show the foreign sessions in a store snapshot
    Inspect {
        /// Snapshot file
        snapshot: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Delete foreign sessions older than the stale threshold
    Sweep {
        /// Snapshot file
        snapshot: PathBuf,

        /// Override the configured threshold, in days
        #[arg(long)]
        threshold_days: Option<u32>,

        /// Save the result back to the snapshot
        #[arg(long)]
        write: bool,
    },

    /// Delete one foreign session and all of its nodes
    Delete {
        /// Snapshot file
        snapshot: PathBuf,

        /// Session tag to delete
        tag: String,

        /// Save the result back to the snapshot
        #[arg(long)]
        write: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init {
            snapshot,
            cache_guid,
        } => {
            init::run(&snapshot, cache_guid.as_deref()).await?;
        }
        Commands::Inspect { snapshot, json } => {
            inspect::run(&snapshot, &config, json).await?;
        }
        Commands::Sweep {
            snapshot,
            threshold_days,
            write,
        } => {
            sweep::run(&snapshot, &config, threshold_days, write).await?;
        }
        Commands::Delete {
            snapshot,
            tag,
            write,
        } => {
            delete::run(&snapshot, &config, &tag, write).await?;
        }
        Commands::Config => {
            show_config::run(&config)?;
        }
    }

    Ok(())
}

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Log to stderr, filtered by `RUST_LOG`.
fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn default_filter_logs_info() {
        let filter = EnvFilter::new(DEFAULT_LOG_FILTER);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn cli_parses_global_config() {
        let cli = Cli::try_parse_from(["tabsync", "config", "--config", "custom.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Config));
    }
}
