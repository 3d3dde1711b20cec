//! Error handling for the semantic model builder.
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** for precise handling in code: every failure
//!    mode the pipeline distinguishes is a [`SemModelError`] variant.
//! 2. **Actionable messages** for CLI users: every fatal error names the
//!    specific entity involved (file path, source name, fact name, missing
//!    column list) so an operator can fix the underlying data and rerun.
//!
//! Application code plumbs errors through [`anyhow::Result`] and attaches
//! context with `.with_context(...)`; typed variants are constructed at the
//! point where the failure is first classified. The CLI converts the final
//! error chain into a colored report via [`display_error`].
//!
//! # Propagation policy
//!
//! Source-level failures ([`SemModelError::NoSourceFiles`],
//! [`SemModelError::SourceParseError`], [`SemModelError::StaleCacheConflict`])
//! are isolated: the orchestrator skips the offending source and keeps going.
//! Builder-level failures ([`SemModelError::MissingSource`],
//! [`SemModelError::EmptySource`], [`SemModelError::MissingColumn`]) abort
//! the whole run. A skipped source produces stale reports an operator can
//! recover from by rerunning later; a builder failure means the model itself
//! is inconsistent and must never produce a silently wrong fact.

use colored::Colorize;
use thiserror::Error;

/// The main error type for semantic model operations.
///
/// Each variant represents a specific failure mode and carries the entity
/// names needed for diagnosis. Variants map one-to-one onto the pipeline's
/// failure taxonomy; see the module docs for which are fatal to a run and
/// which only skip a single source.
#[derive(Error, Debug)]
pub enum SemModelError {
    /// No candidate data root directory exists.
    ///
    /// Raised before any I/O is attempted. The run cannot proceed without an
    /// external data directory, so this is always fatal.
    #[error("data root not found; none of the candidate directories exist:\n  {}", .candidates.join("\n  "))]
    DataRootNotFound {
        /// Candidate paths that were checked, in order.
        candidates: Vec<String>,
    },

    /// A configuration file is missing, malformed, or inconsistent.
    #[error("configuration error in {file}: {reason}")]
    ConfigError {
        /// Path of the offending configuration file.
        file: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A named source currently resolves to zero files.
    ///
    /// Non-fatal to the orchestrator: the source is skipped for this run.
    /// Any fact depending on it will fail loudly at build time instead of
    /// silently producing a partial fact.
    #[error("no source files found for source '{name}'")]
    NoSourceFiles {
        /// The logical source name.
        name: String,
    },

    /// A specific file within a source failed to parse.
    ///
    /// Fatal to that source's load (partial loads are never accepted),
    /// non-fatal to the orchestrator overall.
    #[error("failed to parse {file} while loading source '{name}': {reason}")]
    SourceParseError {
        /// The logical source name being loaded.
        name: String,
        /// The file that failed to parse.
        file: String,
        /// Parser error detail.
        reason: String,
    },

    /// A cache read was attempted with no artifact present.
    ///
    /// Internal: normal operation guards reads with `exists()`, so this
    /// surfacing to a user indicates a bug or out-of-band cache deletion.
    #[error("no cache artifact for source '{name}' at {path}")]
    CacheMiss {
        /// The logical source name.
        name: String,
        /// Expected artifact path.
        path: String,
    },

    /// A cached snapshot exists but the source files behind it are gone.
    ///
    /// This inconsistency requires an explicit operator decision; the
    /// `--on-stale-cache` policy controls whether the run fails (default),
    /// deletes the artifact, or serves the stale snapshot.
    #[error(
        "stale cache conflict for source '{name}': cached artifact {cache_path} exists but no source files are present \
         (rerun with --on-stale-cache delete|ignore to resolve)"
    )]
    StaleCacheConflict {
        /// The logical source name.
        name: String,
        /// Path of the orphaned cache artifact.
        cache_path: String,
    },

    /// A fact builder was invoked without one or more of its required sources.
    #[error("fact '{fact}' is missing required source(s) {missing:?}; available sources: {available:?}")]
    MissingSource {
        /// The fact table being built.
        fact: String,
        /// Required source names absent from the loaded set.
        missing: Vec<String>,
        /// Source names that were available.
        available: Vec<String>,
    },

    /// A required source table is present but has zero rows.
    #[error("source '{source_table}' is empty; cannot build fact '{fact}'")]
    EmptySource {
        /// The fact table being built.
        fact: String,
        /// The empty source.
        source_table: String,
    },

    /// Required columns are absent from a source table.
    #[error("source '{source_table}' is missing column(s) {missing:?} required by fact '{fact}'; available columns: {available:?}")]
    MissingColumn {
        /// The fact table being built.
        fact: String,
        /// The source table missing the columns.
        source_table: String,
        /// Column names that are required but absent.
        missing: Vec<String>,
        /// Column names actually present, for diagnosis.
        available: Vec<String>,
    },

    /// The dependency map names a fact with no registered builder.
    #[error("no builder registered for fact table '{fact}'")]
    BuilderNotRegistered {
        /// The unregistered fact name.
        fact: String,
    },

    /// The dependency declarations contain a cycle.
    ///
    /// Unreachable while the model only has source→fact edges; kept live so
    /// fact→fact chaining cannot be introduced without cycle safety.
    #[error("circular dependency detected: {}", .members.join(" -> "))]
    CyclicDependency {
        /// The nodes forming the cycle, in traversal order.
        members: Vec<String>,
    },

    /// A columnar artifact could not be encoded or decoded.
    #[error("columnar artifact error for {file}: {reason}")]
    ArtifactError {
        /// The artifact path.
        file: String,
        /// Encoder/decoder detail.
        reason: String,
    },

    /// JSON (de)serialization failure for a metadata or config file.
    #[error("invalid JSON in {file}: {reason}")]
    JsonError {
        /// The file that failed to (de)serialize.
        file: String,
        /// Serde error detail.
        reason: String,
    },

    /// Standard I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SemModelError {
    /// A short remediation hint for CLI display, when one exists.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DataRootNotFound { .. } => {
                Some("Check that the data directory is mounted/synced, or pass --data-root explicitly")
            }
            Self::ConfigError { .. } => {
                Some("Fix the configuration file and rerun; see config/ for the expected JSON layout")
            }
            Self::NoSourceFiles { .. } => {
                Some("Verify the source's pattern/path in sources_map.json matches files under the data root")
            }
            Self::StaleCacheConflict { .. } => {
                Some("Rerun with --on-stale-cache delete to drop the orphaned artifact, or restore the source files")
            }
            Self::MissingSource { .. } | Self::EmptySource { .. } | Self::MissingColumn { .. } => {
                Some("Fix the upstream source data (or its load failure earlier in the log) and rerun")
            }
            Self::BuilderNotRegistered { .. } => {
                Some("Remove the fact from model_dependencies.json or register a builder for it")
            }
            _ => None,
        }
    }
}

/// Prints an error chain to stderr in the CLI's colored format.
///
/// The root cause is searched for a [`SemModelError`] to attach a
/// remediation suggestion; the full context chain is printed either way.
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {}", "error:".red().bold(), error);

    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".yellow(), cause);
    }

    if let Some(semmodel_err) = error.downcast_ref::<SemModelError>()
        && let Some(hint) = semmodel_err.suggestion()
    {
        eprintln!("  {} {}", "hint:".cyan(), hint);
    }
}
