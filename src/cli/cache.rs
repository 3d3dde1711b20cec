//! The `cache` subcommand: artifact management.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::cache::CacheStore;
use crate::config;
use crate::freshness::FreshnessTracker;

/// Manage the Parquet source cache.
#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand)]
enum CacheSubcommand {
    /// Delete cache artifacts and their freshness records.
    ///
    /// With a source name, removes just that source; without, removes every
    /// artifact. The next build reloads from the original files.
    Clean {
        /// Source to clean (all sources when omitted).
        source: Option<String>,
    },
}

impl CacheCommand {
    /// Executes the selected cache operation.
    pub fn execute(self, config_dir: &Path, data_root: Option<&Path>) -> Result<()> {
        let data_root = config::resolve_data_root(data_root, config_dir)?;
        let cache = CacheStore::new(&data_root);
        let mut tracker = FreshnessTracker::load(&data_root)?;

        match self.command {
            CacheSubcommand::Clean { source } => {
                let targets = match source {
                    Some(name) => vec![name],
                    None => cache.list()?,
                };

                let mut removed = 0usize;
                for name in &targets {
                    if cache.remove(name)? {
                        removed += 1;
                    }
                    tracker.remove(name);
                }
                tracker.save()?;

                println!(
                    "{}",
                    format!("Removed {removed} cache artifact(s).").green()
                );
            }
        }
        Ok(())
    }
}
