//! Static configuration: source map, dependency map, data-root candidates.
//!
//! Three JSON files, loaded once per run from the config directory:
//!
//! - `sources_map.json` - source name → `{"pattern": "<glob>"}` or
//!   `{"path": "<relative path>"}`, both relative to the data root.
//! - `model_dependencies.json` - fact-table name → ordered list of the
//!   source names it requires.
//! - `data_roots.json` - ordered candidate list of data-root directories;
//!   the first one that exists on this machine wins. The data lives in a
//!   synced external folder whose mount point differs per machine, which is
//!   why this is a list and not a single path.
//!
//! All maps are `BTreeMap` so iteration order - and therefore log output,
//! load order, and error messages - is deterministic.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::core::SemModelError;

/// Declaration of one named source: a glob pattern or a fixed path.
///
/// Exactly one of the two forms must be present; an entry with both keys,
/// neither key, or an unknown key fails deserialization and surfaces as a
/// [`SemModelError::ConfigError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Glob pattern relative to the data root, possibly matching many files.
    Pattern {
        /// The glob, e.g. `clean/*/O_NFCI_*_clean.xlsx`.
        pattern: String,
    },
    /// Fixed path relative to the data root.
    Path {
        /// The relative path, e.g. `tables/T_Reps.xlsx`.
        path: String,
    },
}

impl<'de> Deserialize<'de> for SourceSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            pattern: Option<String>,
            path: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        match (raw.pattern, raw.path) {
            (Some(pattern), None) => Ok(Self::Pattern { pattern }),
            (None, Some(path)) => Ok(Self::Path { path }),
            _ => Err(serde::de::Error::custom(
                "source must declare exactly one of 'pattern' or 'path'",
            )),
        }
    }
}

/// Source name → declaration.
pub type SourceMap = BTreeMap<String, SourceSpec>;

/// Fact-table name → required source names.
pub type DependencyMap = BTreeMap<String, Vec<String>>;

/// Policy for the stale-cache conflict: a cached snapshot exists but the
/// source files behind it are gone.
///
/// The batch runner must never block on a prompt, so the decision is made
/// up front via `--on-stale-cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OnStaleCache {
    /// Surface the conflict as an error and skip the source (default).
    #[default]
    Fail,
    /// Delete the orphaned artifact and freshness record, then treat the
    /// source as missing.
    Delete,
    /// Serve the stale snapshot as if the source were unchanged.
    Ignore,
}

fn config_err(file: &Path, reason: impl ToString) -> SemModelError {
    SemModelError::ConfigError {
        file: file.display().to_string(),
        reason: reason.to_string(),
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SemModelError> {
    if !path.exists() {
        return Err(config_err(path, "file not found"));
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| config_err(path, e))
}

/// Loads `sources_map.json` from the config directory.
pub fn load_source_map(config_dir: &Path) -> Result<SourceMap, SemModelError> {
    let map: SourceMap = load_json(&config_dir.join("sources_map.json"))?;
    info!("loaded sources map: {} source(s)", map.len());
    Ok(map)
}

/// Loads `model_dependencies.json` from the config directory.
pub fn load_dependency_map(config_dir: &Path) -> Result<DependencyMap, SemModelError> {
    let map: DependencyMap = load_json(&config_dir.join("model_dependencies.json"))?;
    info!("loaded dependencies: {} fact table(s)", map.len());
    Ok(map)
}

/// Cross-checks the dependency map against the source map.
///
/// Every source a fact claims to need must be a declared source; a typo here
/// would otherwise surface much later as a confusing missing-source build
/// failure.
pub fn validate_model(
    config_dir: &Path,
    sources: &SourceMap,
    dependencies: &DependencyMap,
) -> Result<(), SemModelError> {
    for (fact, deps) in dependencies {
        let unknown: Vec<&String> =
            deps.iter().filter(|d| !sources.contains_key(*d)).collect();
        if !unknown.is_empty() {
            return Err(config_err(
                &config_dir.join("model_dependencies.json"),
                format!("fact '{fact}' references undeclared source(s) {unknown:?}"),
            ));
        }
    }
    Ok(())
}

/// Resolves the external data root.
///
/// An explicit override wins; otherwise the candidates in `data_roots.json`
/// are checked in order (after `~` expansion) and the first existing
/// directory is returned. No candidate existing is a hard stop before any
/// other I/O happens.
pub fn resolve_data_root(
    override_path: Option<&Path>,
    config_dir: &Path,
) -> Result<PathBuf, SemModelError> {
    if let Some(path) = override_path {
        if path.is_dir() {
            info!("data root (override): {}", path.display());
            return Ok(path.to_path_buf());
        }
        return Err(SemModelError::DataRootNotFound {
            candidates: vec![path.display().to_string()],
        });
    }

    let candidates_path = config_dir.join("data_roots.json");
    let candidates: Vec<String> = load_json(&candidates_path)?;
    if candidates.is_empty() {
        return Err(config_err(&candidates_path, "candidate list is empty"));
    }

    for candidate in &candidates {
        let expanded = PathBuf::from(shellexpand::tilde(candidate).into_owned());
        if expanded.is_dir() {
            info!("data root: {}", expanded.display());
            return Ok(expanded);
        }
    }

    Err(SemModelError::DataRootNotFound { candidates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn source_map_parses_pattern_and_path_entries() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "sources_map.json",
            r#"{
                "O_NFCI": {"pattern": "clean/*/O_NFCI_*_clean.xlsx"},
                "T_Reps": {"path": "tables/T_Reps.xlsx"}
            }"#,
        );

        let map = load_source_map(dir.path()).unwrap();
        assert_eq!(
            map["O_NFCI"],
            SourceSpec::Pattern { pattern: "clean/*/O_NFCI_*_clean.xlsx".into() }
        );
        assert_eq!(map["T_Reps"], SourceSpec::Path { path: "tables/T_Reps.xlsx".into() });
    }

    #[test]
    fn source_entry_with_unknown_shape_is_config_error() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "sources_map.json", r#"{"X": {"glob": "oops"}}"#);

        let err = load_source_map(dir.path()).unwrap_err();
        assert!(matches!(err, SemModelError::ConfigError { .. }));
    }

    #[test]
    fn source_entry_with_both_pattern_and_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "sources_map.json",
            r#"{"X": {"pattern": "a/*.csv", "path": "a/b.csv"}}"#,
        );

        let err = load_source_map(dir.path()).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn missing_config_file_is_config_error_naming_the_file() {
        let dir = TempDir::new().unwrap();
        let err = load_dependency_map(dir.path()).unwrap_err();
        match err {
            SemModelError::ConfigError { file, .. } => {
                assert!(file.contains("model_dependencies.json"));
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn validate_model_rejects_undeclared_sources() {
        let dir = TempDir::new().unwrap();
        let sources: SourceMap =
            [("O_NFCI".to_string(), SourceSpec::Path { path: "x.csv".into() })].into();
        let deps: DependencyMap =
            [("sales_b2b".to_string(), vec!["O_NFCI".to_string(), "T_Ghost".to_string()])].into();

        let err = validate_model(dir.path(), &sources, &deps).unwrap_err();
        assert!(err.to_string().contains("T_Ghost"));

        let ok_deps: DependencyMap =
            [("sales_b2b".to_string(), vec!["O_NFCI".to_string()])].into();
        assert!(validate_model(dir.path(), &sources, &ok_deps).is_ok());
    }

    #[test]
    fn data_root_picks_first_existing_candidate() {
        let config = TempDir::new().unwrap();
        let real_root = TempDir::new().unwrap();
        write_config(
            config.path(),
            "data_roots.json",
            &format!(
                r#"["/nonexistent/one", "{}", "/nonexistent/two"]"#,
                real_root.path().display()
            ),
        );

        let resolved = resolve_data_root(None, config.path()).unwrap();
        assert_eq!(resolved, real_root.path());
    }

    #[test]
    fn data_root_error_lists_candidates_when_none_exist() {
        let config = TempDir::new().unwrap();
        write_config(config.path(), "data_roots.json", r#"["/no/a", "/no/b"]"#);

        let err = resolve_data_root(None, config.path()).unwrap_err();
        match err {
            SemModelError::DataRootNotFound { candidates } => {
                assert_eq!(candidates, vec!["/no/a".to_string(), "/no/b".to_string()]);
            }
            other => panic!("expected DataRootNotFound, got {other:?}"),
        }
    }

    #[test]
    fn data_root_override_bypasses_candidates() {
        let config = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        // no data_roots.json at all: override must not need it
        let resolved = resolve_data_root(Some(root.path()), config.path()).unwrap();
        assert_eq!(resolved, root.path());

        let err =
            resolve_data_root(Some(Path::new("/nonexistent/root")), config.path()).unwrap_err();
        assert!(matches!(err, SemModelError::DataRootNotFound { .. }));
    }
}
