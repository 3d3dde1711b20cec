//! Safe file operations.
//!
//! Every persisted metadata file in the system (freshness index, fact
//! artifacts, cache artifacts) is replaced wholesale, never edited in
//! place. [`atomic_write`] implements the write-to-temp-then-rename
//! sequence that keeps a concurrent reader from ever observing a torn
//! file; Parquet artifacts use the same sequence in
//! [`crate::table::parquet`].

use std::fs;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

/// Creates a directory and all parents if they don't exist.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Atomically writes bytes to a file using write-then-rename.
///
/// The content is written and synced to `<path>.tmp` in the same directory
/// and then renamed over `path`, so the file either keeps its old content or
/// has the complete new content. Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("failed to write temp file: {}", temp_path.display()))?;
        file.sync_all().context("failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to rename temp file to: {}", path.display()))?;
    Ok(())
}

/// String-content convenience wrapper around [`atomic_write`].
pub fn atomic_write_string(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}
