//! Source freshness tracking.
//!
//! The freshness index is the system's lockfile: a persisted record per
//! source of exactly which files were loaded and their modification
//! timestamps, written only after a successful load. On the next run the
//! recorded state is compared against the file system, and any mismatch -
//! a new file, a removed file, or a single differing timestamp -
//! invalidates the whole record and forces a full reload of that source.
//!
//! The comparison is map equality over `path → mtime`, so it is independent
//! of file iteration order by construction. A record is also only as good
//! as its cache artifact: matching timestamps with a missing artifact still
//! means "changed".
//!
//! Persisted at `<data_root>/_meta/_last_loaded.json`. A missing index file
//! means "nothing loaded yet"; a corrupt one is reset to empty with a
//! warning rather than wedging every future run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::SemModelError;
use crate::utils::fs::atomic_write_string;

/// Persisted freshness state for one source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    /// File path → last-observed modification time, milliseconds since epoch.
    pub mtimes: BTreeMap<String, i64>,
    /// Where the cache artifact for this source was written.
    pub parquet_path: String,
    /// Number of files the source resolved to at load time.
    pub file_count: usize,
}

/// The persisted freshness index, all sources.
#[derive(Debug, Default)]
pub struct FreshnessTracker {
    path: PathBuf,
    records: BTreeMap<String, SourceRecord>,
}

impl FreshnessTracker {
    /// Location of the index file under a data root.
    pub fn index_path(data_root: &Path) -> PathBuf {
        data_root.join("_meta").join("_last_loaded.json")
    }

    /// Loads the index for a data root.
    ///
    /// A missing file yields an empty tracker. A file that exists but fails
    /// to parse also yields an empty tracker (every source will simply
    /// reload), with a warning - metadata must never be able to brick the
    /// pipeline.
    pub fn load(data_root: &Path) -> Result<Self, SemModelError> {
        let path = Self::index_path(data_root);
        if !path.exists() {
            return Ok(Self { path, records: BTreeMap::new() });
        }

        let content = fs::read_to_string(&path)?;
        let records = match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!("freshness index {} is corrupt ({e}); resetting", path.display());
                BTreeMap::new()
            }
        };
        Ok(Self { path, records })
    }

    /// Persists the index atomically.
    pub fn save(&self) -> Result<(), SemModelError> {
        let content = serde_json::to_string_pretty(&self.records).map_err(|e| {
            SemModelError::JsonError { file: self.path.display().to_string(), reason: e.to_string() }
        })?;
        atomic_write_string(&self.path, &content)
            .map_err(|e| SemModelError::IoError(std::io::Error::other(format!("{e:#}"))))
    }

    /// The stored record for a source, if any.
    pub fn record(&self, source: &str) -> Option<&SourceRecord> {
        self.records.get(source)
    }

    /// Inserts or replaces the record for a source.
    pub fn upsert(&mut self, source: &str, record: SourceRecord) {
        self.records.insert(source.to_string(), record);
    }

    /// Drops the record for a source (cache invalidation).
    pub fn remove(&mut self, source: &str) {
        self.records.remove(source);
    }

    /// Names of all tracked sources.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// The freshness decision for one source.
    ///
    /// `true` ("changed", reload required) when the current `path → mtime`
    /// map differs from the stored one in any way, or when no record
    /// exists, or when the cache artifact is gone. Pure comparison: nothing
    /// is persisted here.
    pub fn is_changed(
        &self,
        source: &str,
        current: &BTreeMap<String, i64>,
        cache_exists: bool,
    ) -> bool {
        if !cache_exists {
            debug!("{source}: no cache artifact on disk, reload required");
            return true;
        }
        match self.records.get(source) {
            None => {
                debug!("{source}: no freshness record, reload required");
                true
            }
            Some(record) => {
                let changed = record.mtimes != *current;
                if changed {
                    debug!("{source}: file set or mtimes differ from record, reload required");
                }
                changed
            }
        }
    }
}

/// Reads the current modification times for a file set.
///
/// Keyed by full path string, values in milliseconds since the epoch. Every
/// file must exist and be statable; resolution already filtered to existing
/// files, so a failure here is a real I/O problem.
pub fn current_mtimes(files: &[PathBuf]) -> Result<BTreeMap<String, i64>, SemModelError> {
    let mut mtimes = BTreeMap::new();
    for file in files {
        let modified = fs::metadata(file)?.modified()?;
        let millis = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        mtimes.insert(file.display().to_string(), millis);
    }
    Ok(mtimes)
}
