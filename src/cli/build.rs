//! The `build` subcommand: one incremental run.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::config::OnStaleCache;
use crate::orchestrator::{self, BuildOptions, SourceStatus};

/// Run one incremental build against the data root.
#[derive(Args)]
pub struct BuildCommand {
    /// What to do when a cached snapshot exists but its source files are
    /// gone.
    #[arg(long, value_enum, default_value = "fail")]
    on_stale_cache: OnStaleCache,
}

impl BuildCommand {
    /// Executes the run and renders the report.
    pub fn execute(self, config_dir: &Path, data_root: Option<&Path>) -> Result<()> {
        let options = BuildOptions {
            config_dir: config_dir.to_path_buf(),
            data_root: data_root.map(Path::to_path_buf),
            on_stale_cache: self.on_stale_cache,
        };

        let report = orchestrator::run(&options)?;

        println!("data root: {}", report.data_root.display());
        for source in &report.sources {
            let (marker, label) = match source.status {
                SourceStatus::Reloaded => ("~".yellow(), "reloaded"),
                SourceStatus::Cached => ("=".green(), "cached"),
                SourceStatus::Skipped => ("!".red(), "skipped"),
            };
            let rows = source.rows.map(|r| format!(" ({r} rows)")).unwrap_or_default();
            let detail =
                source.detail.as_ref().map(|d| format!(" - {d}")).unwrap_or_default();
            println!("  {marker} {} {label}{rows}{detail}", source.name);
        }

        if report.nothing_rebuilt() {
            println!("{}", "All fact tables up-to-date. Nothing to rebuild.".green());
        } else {
            for fact in &report.rebuilt {
                println!(
                    "  {} {} rebuilt: {} rows in {:.2}s",
                    "+".green(),
                    fact.name,
                    fact.rows,
                    fact.elapsed_seconds
                );
            }
            println!(
                "{}",
                format!("Rebuild complete: {} fact table(s) processed.", report.rebuilt.len())
                    .green()
            );
        }
        Ok(())
    }
}
