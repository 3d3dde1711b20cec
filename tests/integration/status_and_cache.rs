//! The read-only status report and cache management.

use std::fs;

use anyhow::Result;
use predicates::prelude::*;

use crate::common::b2c_project;

#[test]
fn status_reports_freshness_without_side_effects() -> Result<()> {
    let project = b2c_project()?;

    // before any build: everything needs a reload
    project
        .semmodel(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("L_LPI: needs reload"))
        .stdout(predicate::str::contains("T_CondPagto: needs reload"));

    // status must not create caches or records
    assert!(!project.cache_artifact("L_LPI").exists());
    assert!(!project.data_root().join("_meta/_last_loaded.json").exists());

    project.semmodel(&["build"]).assert().success();
    project
        .semmodel(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("L_LPI: up-to-date"));
    Ok(())
}

#[test]
fn status_flags_missing_files_and_stale_caches() -> Result<()> {
    let project = b2c_project()?;
    fs::remove_file(project.data_root().join("tables/T_CondPagto.csv"))?;

    project
        .semmodel(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("T_CondPagto: no source files"));

    // build caches L_LPI, then its export vanishes
    project.semmodel(&["build"]).assert().success();
    fs::remove_file(project.data_root().join("clean/2025_11/L_LPI_2025_11_clean.csv"))?;

    project
        .semmodel(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("L_LPI: source files missing, stale cache present"));
    Ok(())
}

#[test]
fn cache_clean_forces_full_reload_on_next_build() -> Result<()> {
    let project = b2c_project()?;
    project.semmodel(&["build"]).assert().success();
    assert!(project.cache_artifact("L_LPI").exists());

    project
        .semmodel(&["cache", "clean"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 cache artifact(s)"));
    assert!(!project.cache_artifact("L_LPI").exists());
    assert!(!project.cache_artifact("T_CondPagto").exists());

    // next build reloads and rebuilds everything
    project
        .semmodel(&["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sales_b2c rebuilt"));
    Ok(())
}

#[test]
fn cache_clean_single_source_leaves_others_alone() -> Result<()> {
    let project = b2c_project()?;
    project.semmodel(&["build"]).assert().success();

    project
        .semmodel(&["cache", "clean", "L_LPI"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 cache artifact(s)"));

    assert!(!project.cache_artifact("L_LPI").exists());
    assert!(project.cache_artifact("T_CondPagto").exists());
    assert!(!project.freshness_index()?.contains("L_LPI"));
    assert!(project.freshness_index()?.contains("T_CondPagto"));
    Ok(())
}
