//! The `status` subcommand: read-only freshness report.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::cache::CacheStore;
use crate::config;
use crate::freshness::{FreshnessTracker, current_mtimes};
use crate::source::resolve_source_files;

/// Show the freshness decision for every declared source without loading,
/// caching, or mutating anything.
#[derive(Args)]
pub struct StatusCommand {}

impl StatusCommand {
    /// Prints one line per declared source.
    pub fn execute(self, config_dir: &Path, data_root: Option<&Path>) -> Result<()> {
        let data_root = config::resolve_data_root(data_root, config_dir)?;
        let sources_map = config::load_source_map(config_dir)?;
        let tracker = FreshnessTracker::load(&data_root)?;
        let cache = CacheStore::new(&data_root);

        println!("data root: {}", data_root.display());
        for (name, spec) in &sources_map {
            let line = match resolve_source_files(spec, &data_root) {
                Err(e) => format!("{} {name}: unresolvable ({e:#})", "!".red()),
                Ok(files) if files.is_empty() => {
                    if cache.exists(name) {
                        format!("{} {name}: source files missing, stale cache present", "!".red())
                    } else {
                        format!("{} {name}: no source files", "?".yellow())
                    }
                }
                Ok(files) => {
                    let current = current_mtimes(&files)?;
                    if tracker.is_changed(name, &current, cache.exists(name)) {
                        format!("{} {name}: needs reload ({} file(s))", "~".yellow(), files.len())
                    } else {
                        format!("{} {name}: up-to-date ({} file(s))", "=".green(), files.len())
                    }
                }
            };
            println!("  {line}");
        }
        Ok(())
    }
}
