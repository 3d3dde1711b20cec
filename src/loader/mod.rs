//! The smart loader: cache-or-parse orchestration for one source.
//!
//! `load` is the single entry point the orchestrator uses to materialize a
//! source table. It combines the freshness decision, the cache store, and
//! the file parser:
//!
//! - unchanged source → deserialize the cached snapshot, report
//!   `was_reloaded = false`;
//! - changed source → parse every file, concatenate row-wise (column
//!   superset, null-fill), replace the snapshot, persist the new freshness
//!   record, report `was_reloaded = true`.
//!
//! A parse failure in any single file abandons the whole source load -
//! a partially loaded source would poison every fact built from it.
//!
//! The pathological state where a cached snapshot exists but the source
//! files are gone is resolved by the [`OnStaleCache`] policy chosen at
//! startup; the loader never prompts and never silently deletes.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::config::OnStaleCache;
use crate::core::SemModelError;
use crate::freshness::{FreshnessTracker, SourceRecord, current_mtimes};
use crate::table::Table;
use crate::table::reader::read_table;

/// The freshness decision for a source, from [`SmartLoader::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The cached snapshot is still valid; no reparse needed.
    Unchanged,
    /// The source must be (re)loaded from its files.
    Changed,
}

/// Loads sources through the freshness/cache layers.
pub struct SmartLoader<'a> {
    cache: &'a CacheStore,
    tracker: &'a mut FreshnessTracker,
    policy: OnStaleCache,
}

impl<'a> SmartLoader<'a> {
    /// Creates a loader over a cache store and freshness tracker.
    pub fn new(
        cache: &'a CacheStore,
        tracker: &'a mut FreshnessTracker,
        policy: OnStaleCache,
    ) -> Self {
        Self { cache, tracker, policy }
    }

    /// The freshness decision for a source, without materializing anything.
    ///
    /// Applies the stale-cache policy when `files` is empty (so a `Delete`
    /// probe does remove the orphaned artifact), but otherwise performs no
    /// I/O beyond `stat`. The orchestrator probes every declared source and
    /// only materializes the tables a rebuild actually needs.
    pub fn probe(&mut self, source: &str, files: &[PathBuf]) -> Result<Freshness, SemModelError> {
        if files.is_empty() {
            return self.probe_no_files(source);
        }
        let current = current_mtimes(files)?;
        if self.tracker.is_changed(source, &current, self.cache.exists(source)) {
            Ok(Freshness::Changed)
        } else {
            Ok(Freshness::Unchanged)
        }
    }

    /// Returns the source's table and whether it was freshly (re)loaded.
    ///
    /// `files` is the source's current resolution - already filtered to
    /// existing files. An empty list is the no-data case: an error for the
    /// caller to classify, with the stale-cache policy applied first if an
    /// orphaned snapshot exists.
    pub fn load(
        &mut self,
        source: &str,
        files: &[PathBuf],
    ) -> Result<(Table, bool), SemModelError> {
        match self.probe(source, files)? {
            Freshness::Unchanged => {
                let table = self.cache.read(source)?;
                info!(
                    "{source}: {} rows, {} cols [cached]",
                    table.n_rows(),
                    table.n_cols()
                );
                return Ok((table, false));
            }
            Freshness::Changed => {}
        }

        let current = current_mtimes(files)?;
        info!("{source}: loading {} file(s)", files.len());
        let start = Instant::now();

        let mut parts = Vec::with_capacity(files.len());
        for file in files {
            let part = read_table(file).map_err(|e| SemModelError::SourceParseError {
                name: source.to_string(),
                file: file.display().to_string(),
                reason: format!("{e:#}"),
            })?;
            parts.push(part);
        }
        let table = Table::concat(parts.iter());

        let cache_path = self.cache.write(source, &table)?;
        self.tracker.upsert(
            source,
            SourceRecord {
                mtimes: current,
                parquet_path: cache_path.display().to_string(),
                file_count: files.len(),
            },
        );
        self.tracker.save()?;

        info!(
            "{source}: {} rows, {} cols [loaded in {:.2}s]",
            table.n_rows(),
            table.n_cols(),
            start.elapsed().as_secs_f64()
        );
        Ok((table, true))
    }

    fn probe_no_files(&mut self, source: &str) -> Result<Freshness, SemModelError> {
        if !self.cache.exists(source) {
            return Err(SemModelError::NoSourceFiles { name: source.to_string() });
        }

        let cache_path = self.cache.artifact_path(source);
        match self.policy {
            OnStaleCache::Fail => Err(SemModelError::StaleCacheConflict {
                name: source.to_string(),
                cache_path: cache_path.display().to_string(),
            }),
            OnStaleCache::Delete => {
                warn!("{source}: deleting stale cache artifact {}", cache_path.display());
                self.cache.remove(source)?;
                self.tracker.remove(source);
                self.tracker.save()?;
                Err(SemModelError::NoSourceFiles { name: source.to_string() })
            }
            OnStaleCache::Ignore => {
                warn!(
                    "{source}: source files missing, serving stale cache {}",
                    cache_path.display()
                );
                Ok(Freshness::Unchanged)
            }
        }
    }
}
