//! The incremental build lifecycle, end to end.

use std::fs;

use anyhow::Result;
use predicates::prelude::*;

use crate::common::{LPI_CSV, b2c_project};

#[test]
fn first_build_loads_sources_and_writes_fact() -> Result<()> {
    let project = b2c_project()?;

    project
        .semmodel(&["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sales_b2c rebuilt: 2 rows"));

    assert!(project.cache_artifact("L_LPI").exists());
    assert!(project.cache_artifact("T_CondPagto").exists());
    assert!(project.fact_artifact("sales_b2c").exists());
    assert!(project.freshness_index()?.contains("L_LPI"));
    assert!(project.build_log()?.contains("sales_b2c,rebuilt,2"));
    Ok(())
}

#[test]
fn rerun_without_changes_is_a_no_op() -> Result<()> {
    let project = b2c_project()?;
    project.semmodel(&["build"]).assert().success();

    let fact_before = fs::read(project.fact_artifact("sales_b2c"))?;
    let log_before = project.build_log()?;

    project
        .semmodel(&["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to rebuild"));

    // artifacts and log byte-for-byte unchanged
    assert_eq!(fs::read(project.fact_artifact("sales_b2c"))?, fact_before);
    assert_eq!(project.build_log()?, log_before);
    Ok(())
}

#[test]
fn touching_a_source_propagates_to_its_dependents() -> Result<()> {
    let project = b2c_project()?;
    project.semmodel(&["build"]).assert().success();

    let fact_mtime_before =
        fs::metadata(project.fact_artifact("sales_b2c"))?.modified()?;

    project.touch("clean/2025_11/L_LPI_2025_11_clean.csv")?;
    project
        .semmodel(&["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sales_b2c rebuilt"));

    let fact_mtime_after = fs::metadata(project.fact_artifact("sales_b2c"))?.modified()?;
    assert!(fact_mtime_after > fact_mtime_before);
    assert_eq!(project.build_log()?.matches("sales_b2c,rebuilt").count(), 2);
    Ok(())
}

#[test]
fn touching_an_unconsumed_source_rebuilds_nothing() -> Result<()> {
    let project = b2c_project()?;
    project.semmodel(&["build"]).assert().success();

    project.touch("tables/T_CondPagto.csv")?;
    project
        .semmodel(&["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to rebuild"));
    Ok(())
}

#[test]
fn missing_required_source_fails_the_dependent_fact_loudly() -> Result<()> {
    let project = b2c_project()?;
    // L_LPI's export never arrives, but T_CondPagto exists and sales_b2c is
    // (re)declared to need both - the fact must be attempted and fail naming
    // the missing source, and the run must exit non-zero.
    fs::remove_file(
        project.data_root().join("clean/2025_11/L_LPI_2025_11_clean.csv"),
    )?;
    project.write_dependencies(r#"{"sales_b2c": ["L_LPI", "T_CondPagto"]}"#)?;

    project
        .semmodel(&["build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("L_LPI"));

    assert!(!project.fact_artifact("sales_b2c").exists());
    Ok(())
}

#[test]
fn empty_source_aborts_without_writing_a_fact() -> Result<()> {
    let project = b2c_project()?;
    // header-only export: loads fine, builder must reject it
    project.write_csv(
        "clean/2025_11/L_LPI_2025_11_clean.csv",
        "CODPF,Qt,Data,PMerc_T,PMerc_U\n",
    )?;

    project
        .semmodel(&["build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty"));

    assert!(!project.fact_artifact("sales_b2c").exists());
    assert!(project.build_log()?.contains("sales_b2c,error,0"));
    Ok(())
}

#[test]
fn prior_fact_artifact_survives_a_failed_rebuild() -> Result<()> {
    let project = b2c_project()?;
    project.semmodel(&["build"]).assert().success();
    let fact_before = fs::read(project.fact_artifact("sales_b2c"))?;

    // the next month's export is empty: rebuild fails
    project.write_csv(
        "clean/2025_11/L_LPI_2025_11_clean.csv",
        "CODPF,Qt,Data,PMerc_T,PMerc_U\n",
    )?;
    project.semmodel(&["build"]).assert().failure();

    assert_eq!(fs::read(project.fact_artifact("sales_b2c"))?, fact_before);
    Ok(())
}

#[test]
fn malformed_source_file_is_skipped_but_other_sources_load() -> Result<()> {
    let project = b2c_project()?;
    project.write_csv("clean/2025_11/L_LPI_2025_11_clean.csv", "A,B\n1\n2,3,4\n")?;

    // L_LPI fails to parse; T_CondPagto still loads and changes, but no
    // fact depends on it, so the run succeeds with a skip.
    project
        .semmodel(&["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"));

    assert!(!project.cache_artifact("L_LPI").exists());
    assert!(project.cache_artifact("T_CondPagto").exists());
    Ok(())
}

#[test]
fn missing_data_root_is_a_hard_stop() -> Result<()> {
    let project = b2c_project()?;
    let mut cmd = assert_cmd::Command::cargo_bin("semmodel")?;
    cmd.arg("build")
        .arg("--config-dir")
        .arg(project.config_path())
        .arg("--data-root")
        .arg("/nonexistent/semmodel-root")
        .assert()
        .failure()
        .stderr(predicate::str::contains("data root not found"));
    Ok(())
}

#[test]
fn missing_config_is_a_hard_stop() -> Result<()> {
    let project = b2c_project()?;
    fs::remove_file(project.config_path().join("model_dependencies.json"))?;

    project
        .semmodel(&["build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("model_dependencies.json"));
    Ok(())
}

#[test]
fn multi_file_pattern_source_concatenates_monthly_files() -> Result<()> {
    let project = b2c_project()?;
    project.write_csv("clean/2025_12/L_LPI_2025_12_clean.csv", LPI_CSV)?;

    project
        .semmodel(&["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sales_b2c rebuilt: 4 rows"));
    Ok(())
}

#[test]
fn stale_cache_policy_is_honored() -> Result<()> {
    let project = b2c_project()?;
    project.semmodel(&["build"]).assert().success();

    // export vanishes while the cache artifact remains
    fs::remove_file(project.data_root().join("clean/2025_11/L_LPI_2025_11_clean.csv"))?;

    // default policy: the conflict is surfaced (source skipped, run ok
    // since nothing changed)
    project
        .semmodel(&["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stale cache"));
    assert!(project.cache_artifact("L_LPI").exists());

    // delete policy: the artifact and record are dropped
    project
        .semmodel(&["build", "--on-stale-cache", "delete"])
        .assert()
        .success();
    assert!(!project.cache_artifact("L_LPI").exists());
    assert!(!project.freshness_index()?.contains("L_LPI"));
    Ok(())
}
