//! Common test utilities for semmodel integration tests.

// Allow dead code because these utilities are shared across test files and
// not every helper is used in every file.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use assert_cmd::Command;
use tempfile::TempDir;

/// A throwaway config directory + data root with helpers for declaring
/// sources and running the binary against them.
pub struct TestProject {
    config_dir: TempDir,
    data_dir: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_dir: TempDir::new().context("create config dir")?,
            data_dir: TempDir::new().context("create data dir")?,
        })
    }

    pub fn config_path(&self) -> &Path {
        self.config_dir.path()
    }

    pub fn data_root(&self) -> &Path {
        self.data_dir.path()
    }

    /// Writes `sources_map.json` from raw JSON.
    pub fn write_sources_map(&self, json: &str) -> Result<()> {
        fs::write(self.config_path().join("sources_map.json"), json).context("write sources map")
    }

    /// Writes `model_dependencies.json` from raw JSON.
    pub fn write_dependencies(&self, json: &str) -> Result<()> {
        fs::write(self.config_path().join("model_dependencies.json"), json)
            .context("write dependency map")
    }

    /// Writes a CSV file under the data root, creating parent directories.
    pub fn write_csv(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.data_root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create data subdirectory")?;
        }
        fs::write(&path, content).context("write csv")?;
        Ok(path)
    }

    /// Advances a file's mtime so the freshness layer sees a change.
    pub fn touch(&self, relative: &str) -> Result<()> {
        let path = self.data_root().join(relative);
        let file = fs::File::options().append(true).open(&path).context("open for touch")?;
        file.set_modified(SystemTime::now() + Duration::from_secs(10)).context("set mtime")?;
        Ok(())
    }

    /// A `semmodel` command pre-wired to this project's config and root.
    pub fn semmodel(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("semmodel").expect("binary built");
        cmd.arg(args[0])
            .args(&args[1..])
            .arg("--config-dir")
            .arg(self.config_path())
            .arg("--data-root")
            .arg(self.data_root());
        cmd
    }

    pub fn cache_artifact(&self, source: &str) -> PathBuf {
        self.data_root().join("cache").join(format!("{source}.parquet"))
    }

    pub fn fact_artifact(&self, fact: &str) -> PathBuf {
        self.data_root().join("facts").join(format!("{fact}.parquet"))
    }

    pub fn build_log(&self) -> Result<String> {
        fs::read_to_string(self.data_root().join("_meta/_build_log.csv")).context("read build log")
    }

    pub fn freshness_index(&self) -> Result<String> {
        fs::read_to_string(self.data_root().join("_meta/_last_loaded.json"))
            .context("read freshness index")
    }
}

/// Minimal valid L_LPI export content.
pub const LPI_CSV: &str = "CODPF,Qt,Data,PMerc_T,PMerc_U\nPF1,2,2025-11-03,50.0,25.0\nPF2,1,2025-11-04,30.0,30.0\n";

/// A project with one pattern source (L_LPI) and one fixed-path source
/// (T_CondPagto), where `sales_b2c` depends on L_LPI only.
pub fn b2c_project() -> Result<TestProject> {
    let project = TestProject::new()?;
    project.write_sources_map(
        r#"{
            "L_LPI": {"pattern": "clean/*/L_LPI_*_clean.csv"},
            "T_CondPagto": {"path": "tables/T_CondPagto.csv"}
        }"#,
    )?;
    project.write_dependencies(r#"{"sales_b2c": ["L_LPI"]}"#)?;
    project.write_csv("clean/2025_11/L_LPI_2025_11_clean.csv", LPI_CSV)?;
    project.write_csv("tables/T_CondPagto.csv", "COND,DIAS\n30DD,30\n")?;
    Ok(project)
}
