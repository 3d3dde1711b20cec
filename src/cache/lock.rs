//! Run-level file locking.
//!
//! The freshness index and the cache artifacts are read-modify-written over
//! the course of a run. One orchestrator per data root is the normal mode,
//! but nothing stops an operator from launching two; the run lock turns
//! that into a wait instead of a torn metadata file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use tracing::debug;

/// An exclusive lock over a data root, held for the duration of a run.
///
/// The lock is an OS-level advisory file lock on `_meta/.run.lock` and is
/// released when the instance is dropped (or the process exits).
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl RunLock {
    /// Acquires the run lock, blocking until any other holder releases it.
    pub fn acquire(data_root: &Path) -> Result<Self> {
        let meta_dir = data_root.join("_meta");
        std::fs::create_dir_all(&meta_dir)
            .with_context(|| format!("failed to create directory: {}", meta_dir.display()))?;

        let path = meta_dir.join(".run.lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("failed to open lock file: {}", path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("failed to lock: {}", path.display()))?;
        debug!("acquired run lock at {}", path.display());

        Ok(Self { _file: file, path })
    }

    /// Path of the lock file (for diagnostics).
    pub fn path(&self) -> &Path {
        &self.path
    }
}
