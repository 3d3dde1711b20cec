//! Command-line interface for the semantic model builder.
//!
//! Three subcommands over a shared pair of global options:
//!
//! - `build` - one full incremental run: probe sources, reload what
//!   changed, rebuild dependent facts.
//! - `status` - read-only freshness report; touches nothing.
//! - `cache clean` - drop cache artifacts and their freshness records.
//!
//! Global `--config-dir` points at the JSON declarations, `--data-root`
//! bypasses the candidate-root resolution. `--verbose`/`--quiet` steer the
//! tracing filter; `RUST_LOG` wins when set.

pub mod build;
pub mod cache;
pub mod status;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Top-level CLI for the incremental semantic-model builder.
#[derive(Parser)]
#[command(
    name = "semmodel",
    about = "Incremental semantic-model builder for tabular fact models",
    version,
    long_about = "Loads spreadsheet sources with change-detection caching and rebuilds only \
                  the fact tables whose inputs changed."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding sources_map.json, model_dependencies.json and
    /// data_roots.json.
    #[arg(long, global = true, default_value = "config", env = "SEMMODEL_CONFIG_DIR")]
    config_dir: PathBuf,

    /// Explicit data root, bypassing the candidate list in data_roots.json.
    #[arg(long, global = true, env = "SEMMODEL_DATA_ROOT")]
    data_root: Option<PathBuf>,

    /// Enable debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress everything except errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run one incremental build against the data root.
    Build(build::BuildCommand),
    /// Show per-source freshness without loading or mutating anything.
    Status(status::StatusCommand),
    /// Manage the Parquet source cache.
    Cache(cache::CacheCommand),
}

impl Cli {
    /// Installs logging and dispatches to the selected subcommand.
    pub fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);

        match self.command {
            Commands::Build(cmd) => cmd.execute(&self.config_dir, self.data_root.as_deref()),
            Commands::Status(cmd) => cmd.execute(&self.config_dir, self.data_root.as_deref()),
            Commands::Cache(cmd) => cmd.execute(&self.config_dir, self.data_root.as_deref()),
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
