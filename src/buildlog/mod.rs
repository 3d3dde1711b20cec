//! Append-only audit log of rebuild operations.
//!
//! Every fact-build attempt lands as one CSV row in
//! `<data_root>/_meta/_build_log.csv`: when it ran, what was built, whether
//! it worked, how many rows came out, and how long it took. Rows are only
//! ever appended - the log is the history an operator consults when a
//! month's numbers look off ("when was this fact last rebuilt, and from
//! what?").

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::utils::fs::ensure_dir;

/// Outcome of one build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// The fact was rebuilt and its artifact replaced.
    Rebuilt,
    /// The fact was deliberately not rebuilt.
    Skipped,
    /// The builder ran and failed; no artifact was written.
    Error,
}

/// One log row.
#[derive(Debug, Serialize)]
struct LogRow<'a> {
    timestamp: String,
    table_name: &'a str,
    status: BuildStatus,
    rows: usize,
    elapsed_seconds: String,
}

/// Writer handle for the build log of one data root.
#[derive(Debug, Clone)]
pub struct BuildLogger {
    log_path: PathBuf,
}

impl BuildLogger {
    /// Logger writing to `<data_root>/_meta/_build_log.csv`.
    pub fn new(data_root: &Path) -> Self {
        Self { log_path: data_root.join("_meta").join("_build_log.csv") }
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Appends one row, creating the file (with header) on first use.
    pub fn log(
        &self,
        table_name: &str,
        status: BuildStatus,
        rows: usize,
        elapsed_seconds: f64,
    ) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            ensure_dir(parent)?;
        }
        let is_new = !self.log_path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("cannot open build log: {}", self.log_path.display()))?;

        let mut writer = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
        writer
            .serialize(LogRow {
                timestamp: chrono::Local::now().to_rfc3339(),
                table_name,
                status,
                rows,
                elapsed_seconds: format!("{elapsed_seconds:.2}"),
            })
            .context("cannot serialize build log row")?;
        writer.flush().context("cannot flush build log")?;

        debug!("logged build: {table_name} {status:?} ({rows} rows)");
        Ok(())
    }
}
