//! The Parquet-backed source cache.
//!
//! One columnar artifact per named source at `cache/<source>.parquet`,
//! standing in for a full reparse of the source's spreadsheet files when
//! the freshness layer says nothing changed. Operations are whole-table
//! replace only; an artifact is never patched in place, and the rename-based
//! write means a reader can never observe a half-written snapshot.

pub mod lock;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::SemModelError;
use crate::table::Table;
use crate::table::parquet::{read_parquet, write_parquet_atomic};

/// Handle to the cache directory of one data root.
#[derive(Debug, Clone)]
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    /// Creates a store rooted at `<data_root>/cache`.
    ///
    /// The directory itself is created lazily on first write.
    pub fn new(data_root: &Path) -> Self {
        Self { cache_dir: data_root.join("cache") }
    }

    /// Deterministic artifact path for a source name.
    pub fn artifact_path(&self, source: &str) -> PathBuf {
        self.cache_dir.join(format!("{source}.parquet"))
    }

    /// Whether an artifact exists for the source.
    pub fn exists(&self, source: &str) -> bool {
        self.artifact_path(source).is_file()
    }

    /// Serializes a table as the source's snapshot, replacing any prior one.
    pub fn write(&self, source: &str, table: &Table) -> Result<PathBuf, SemModelError> {
        let path = self.artifact_path(source);
        write_parquet_atomic(&path, table)?;
        Ok(path)
    }

    /// Reads the source's snapshot back into a table.
    pub fn read(&self, source: &str) -> Result<Table, SemModelError> {
        let path = self.artifact_path(source);
        if !path.is_file() {
            return Err(SemModelError::CacheMiss {
                name: source.to_string(),
                path: path.display().to_string(),
            });
        }
        read_parquet(&path)
    }

    /// Deletes the source's artifact. Returns whether one existed.
    pub fn remove(&self, source: &str) -> Result<bool, SemModelError> {
        let path = self.artifact_path(source);
        if path.is_file() {
            fs::remove_file(&path)?;
            debug!("removed cache artifact {}", path.display());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Source names that currently have an artifact, sorted.
    pub fn list(&self) -> Result<Vec<String>, SemModelError> {
        if !self.cache_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("parquet")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
