//! The build orchestrator: one full incremental run over a data root.
//!
//! A run moves through fixed phases:
//!
//! 1. resolve the data root (hard stop if no candidate exists);
//! 2. load and validate the source and dependency declarations;
//! 3. probe every declared source, reloading the changed ones through the
//!    smart loader and collecting the changed set;
//! 4. short-circuit when nothing changed;
//! 5. map changed sources to the facts that must be rebuilt;
//! 6. materialize any additional sources those rebuilds need (unchanged
//!    sources are deserialized from cache only on demand);
//! 7. rebuild each fact in deterministic order, persist its artifact, and
//!    append a build-log row.
//!
//! Failure handling is asymmetric on purpose. A source that fails to load
//! is skipped with a warning - other sources keep loading, and only facts
//! depending on it are affected (they fail loudly at build time). A fact
//! builder that fails aborts the entire run after logging: a builder error
//! means the model is inconsistent, and no further facts are built on top
//! of that.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::buildlog::{BuildLogger, BuildStatus};
use crate::builders::BuilderRegistry;
use crate::cache::CacheStore;
use crate::cache::lock::RunLock;
use crate::config::{self, OnStaleCache};
use crate::core::SemModelError;
use crate::freshness::FreshnessTracker;
use crate::graph::DependencyGraph;
use crate::loader::{Freshness, SmartLoader};
use crate::source::resolve_source_files;
use crate::table::Table;
use crate::table::parquet::write_parquet_atomic;

/// Options for one orchestrator run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory holding the JSON configuration files.
    pub config_dir: PathBuf,
    /// Explicit data root, bypassing the candidate list.
    pub data_root: Option<PathBuf>,
    /// Stale-cache conflict policy.
    pub on_stale_cache: OnStaleCache,
}

/// How a declared source fared during the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// Files changed; the source was reparsed and recached.
    Reloaded,
    /// Snapshot still valid; nothing reparsed.
    Cached,
    /// Load failed; the source is absent from this run.
    Skipped,
}

/// Per-source result line for the report.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    /// Logical source name.
    pub name: String,
    /// What happened.
    pub status: SourceStatus,
    /// Row count, when the table was materialized this run.
    pub rows: Option<usize>,
    /// Failure detail for skipped sources.
    pub detail: Option<String>,
}

/// Per-fact result line for the report.
#[derive(Debug, Clone)]
pub struct FactOutcome {
    /// Fact table name.
    pub name: String,
    /// Rows in the rebuilt fact.
    pub rows: usize,
    /// Build duration.
    pub elapsed_seconds: f64,
}

/// Summary of a completed run, rendered by the CLI.
#[derive(Debug)]
pub struct BuildReport {
    /// The resolved data root.
    pub data_root: PathBuf,
    /// One line per declared source.
    pub sources: Vec<SourceOutcome>,
    /// Sources that changed this run, sorted.
    pub changed_sources: Vec<String>,
    /// Facts rebuilt this run, in build order.
    pub rebuilt: Vec<FactOutcome>,
}

impl BuildReport {
    /// `true` when the run completed without rebuilding anything.
    pub fn nothing_rebuilt(&self) -> bool {
        self.rebuilt.is_empty()
    }
}

/// Artifact path for a fact table under a data root.
pub fn fact_artifact_path(data_root: &Path, fact: &str) -> PathBuf {
    data_root.join("facts").join(format!("{fact}.parquet"))
}

/// Executes one full incremental build run.
pub fn run(options: &BuildOptions) -> Result<BuildReport> {
    let data_root = config::resolve_data_root(options.data_root.as_deref(), &options.config_dir)?;

    let sources_map = config::load_source_map(&options.config_dir)?;
    let dependencies = config::load_dependency_map(&options.config_dir)?;
    config::validate_model(&options.config_dir, &sources_map, &dependencies)?;
    let graph = DependencyGraph::from_dependencies(&dependencies)?;
    let registry = BuilderRegistry::standard();

    let _lock = RunLock::acquire(&data_root)?;
    let cache = CacheStore::new(&data_root);
    let mut tracker = FreshnessTracker::load(&data_root)?;
    let logger = BuildLogger::new(&data_root);
    let mut loader = SmartLoader::new(&cache, &mut tracker, options.on_stale_cache);

    // Probe all declared sources; reload only the changed ones.
    let mut outcomes: Vec<SourceOutcome> = Vec::new();
    let mut loaded: BTreeMap<String, Table> = BTreeMap::new();
    let mut changed: BTreeSet<String> = BTreeSet::new();

    for (name, spec) in &sources_map {
        let resolved = resolve_source_files(spec, &data_root);
        let outcome = match resolved {
            Ok(files) => match loader.probe(name, &files) {
                Ok(Freshness::Unchanged) => {
                    info!("{name}: up-to-date");
                    SourceOutcome {
                        name: name.clone(),
                        status: SourceStatus::Cached,
                        rows: None,
                        detail: None,
                    }
                }
                Ok(Freshness::Changed) => match loader.load(name, &files) {
                    Ok((table, was_reloaded)) => {
                        if was_reloaded {
                            changed.insert(name.clone());
                        }
                        let rows = table.n_rows();
                        loaded.insert(name.clone(), table);
                        SourceOutcome {
                            name: name.clone(),
                            status: if was_reloaded {
                                SourceStatus::Reloaded
                            } else {
                                SourceStatus::Cached
                            },
                            rows: Some(rows),
                            detail: None,
                        }
                    }
                    Err(e) => skip_source(name, &e),
                },
                Err(e) => skip_source(name, &e),
            },
            Err(e) => {
                warn!("skipping source '{name}': {e:#}");
                SourceOutcome {
                    name: name.clone(),
                    status: SourceStatus::Skipped,
                    rows: None,
                    detail: Some(format!("{e:#}")),
                }
            }
        };
        outcomes.push(outcome);
    }

    let changed_sources: Vec<String> = changed.iter().cloned().collect();
    if changed.is_empty() {
        info!("all sources up-to-date, nothing to rebuild");
        return Ok(BuildReport {
            data_root,
            sources: outcomes,
            changed_sources,
            rebuilt: Vec::new(),
        });
    }
    info!("changed sources: {}", changed_sources.join(", "));

    let rebuild_set = graph.rebuild_set(&changed);
    if rebuild_set.is_empty() {
        info!("no fact tables depend on the changed sources");
        return Ok(BuildReport {
            data_root,
            sources: outcomes,
            changed_sources,
            rebuilt: Vec::new(),
        });
    }
    info!("fact tables to rebuild: {}", rebuild_set.join(", "));

    // Facts may need sources that didn't change this run and were therefore
    // never materialized; pull those from cache now.
    for fact in &rebuild_set {
        let Some(fact_sources) = graph.sources_for(fact) else { continue };
        for source in fact_sources {
            if loaded.contains_key(source) {
                continue;
            }
            let Some(spec) = sources_map.get(source) else { continue };
            match resolve_source_files(spec, &data_root)
                .and_then(|files| loader.load(source, &files).map_err(anyhow::Error::from))
            {
                Ok((table, _)) => {
                    loaded.insert(source.clone(), table);
                }
                Err(e) => {
                    // The dependent builder will fail with the precise
                    // missing-source error; the load failure is context.
                    warn!("cannot load source '{source}' needed by '{fact}': {e:#}");
                }
            }
        }
    }

    // Rebuild, strictly: the first builder failure aborts the run.
    let mut rebuilt = Vec::new();
    for fact in &rebuild_set {
        let builder = registry.get(fact).ok_or_else(|| SemModelError::BuilderNotRegistered {
            fact: fact.clone(),
        })?;

        info!("rebuilding {fact}...");
        let start = Instant::now();
        match builder.build(&data_root, &loaded) {
            Ok(table) => {
                let elapsed = start.elapsed().as_secs_f64();
                let artifact = fact_artifact_path(&data_root, fact);
                write_parquet_atomic(&artifact, &table)?;
                logger.log(fact, BuildStatus::Rebuilt, table.n_rows(), elapsed)?;
                info!("{fact}: {} rows written to {}", table.n_rows(), artifact.display());
                rebuilt.push(FactOutcome {
                    name: fact.clone(),
                    rows: table.n_rows(),
                    elapsed_seconds: elapsed,
                });
            }
            Err(e) => {
                let elapsed = start.elapsed().as_secs_f64();
                logger.log(fact, BuildStatus::Error, 0, elapsed)?;
                return Err(anyhow::Error::from(e))
                    .with_context(|| format!("failed to build fact table '{fact}'"));
            }
        }
    }

    Ok(BuildReport { data_root, sources: outcomes, changed_sources, rebuilt })
}

fn skip_source(name: &str, error: &SemModelError) -> SourceOutcome {
    warn!("skipping source '{name}': {error}");
    SourceOutcome {
        name: name.to_string(),
        status: SourceStatus::Skipped,
        rows: None,
        detail: Some(error.to_string()),
    }
}
