//! The full B2B margin model, built through the binary.

use anyhow::Result;
use predicates::prelude::*;

use crate::common::TestProject;

/// Declares O_NFCI plus the seven lookup tables and wires `sales_b2b` to
/// all of them.
fn b2b_project() -> Result<TestProject> {
    let project = TestProject::new()?;
    project.write_sources_map(
        r#"{
            "O_NFCI": {"pattern": "clean/*/O_NFCI_*_clean.csv"},
            "T_Remessas": {"path": "tables/T_Remessas.csv"},
            "T_ProdF": {"path": "tables/T_ProdF.csv"},
            "T_GruposCli": {"path": "tables/T_GruposCli.csv"},
            "T_Entradas": {"path": "tables/T_Entradas.csv"},
            "T_Reps": {"path": "tables/T_Reps.csv"},
            "T_Fretes": {"path": "tables/T_Fretes.csv"},
            "T_Verbas": {"path": "tables/T_Verbas.csv"}
        }"#,
    )?;
    project.write_dependencies(
        r#"{
            "sales_b2b": [
                "O_NFCI", "T_Remessas", "T_ProdF", "T_GruposCli",
                "T_Entradas", "T_Reps", "T_Fretes", "T_Verbas"
            ]
        }"#,
    )?;

    project.write_csv(
        "clean/2025_11/O_NFCI_2025_11_clean.csv",
        "Situação,OP,NomeF,CodPF,Vendedor,UF,Data,Qt,PMerc_U,PMerc_T,PNF_T,ICMS_T\n\
         Autorizado,Venda,Cliente A,PF1,Rep1,SP,2025-11-10,10,20.0,200.0,210.0,10.0\n\
         Cancelado,Venda,Cliente A,PF1,Rep1,SP,2025-11-11,1,20.0,20.0,21.0,1.0\n\
         Autorizado,Remessa de Produto,Cliente B,PF1,Rep1,RJ,2025-11-12,4,0.0,0.0,0.0,0.0\n",
    )?;
    project.write_csv("tables/T_Remessas.csv", "NomeF\nCliente B\n")?;
    project.write_csv("tables/T_ProdF.csv", "CodPF,CodPP\nPF1,PP1\n")?;
    project.write_csv("tables/T_GruposCli.csv", "NomeF,G1\nCliente A,KEY\n")?;
    project.write_csv(
        "tables/T_Entradas.csv",
        "PAI,Ultima Entrada,Ult CU R$\nPP1,2025-10-01,5.0\nPP1,2025-11-05,6.0\nPP1,2025-12-01,9.0\n",
    )?;
    project.write_csv("tables/T_Reps.csv", "Vendedor,ComissPct\nRep1,0.05\n")?;
    project.write_csv("tables/T_Fretes.csv", "UF,FretePct\nSP,0.02\nRJ,0.03\n")?;
    project.write_csv("tables/T_Verbas.csv", "NomeF,VerbaPct\nCliente A,0.01\n")?;
    Ok(project)
}

#[test]
fn b2b_model_builds_from_real_shaped_sources() -> Result<()> {
    let project = b2b_project()?;

    project
        .semmodel(&["build"])
        .assert()
        .success()
        // canceled invoice filtered: 3 input rows -> 2 fact rows
        .stdout(predicate::str::contains("sales_b2b rebuilt: 2 rows"));

    assert!(project.fact_artifact("sales_b2b").exists());
    // all eight sources cached
    for source in [
        "O_NFCI", "T_Remessas", "T_ProdF", "T_GruposCli", "T_Entradas", "T_Reps", "T_Fretes",
        "T_Verbas",
    ] {
        assert!(project.cache_artifact(source).exists(), "missing cache for {source}");
    }
    Ok(())
}

#[test]
fn touching_a_lookup_table_rebuilds_the_b2b_fact() -> Result<()> {
    let project = b2b_project()?;
    project.semmodel(&["build"]).assert().success();

    project.touch("tables/T_Fretes.csv")?;
    project
        .semmodel(&["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sales_b2b rebuilt"));

    assert_eq!(project.build_log()?.matches("sales_b2b,rebuilt").count(), 2);
    Ok(())
}

#[test]
fn missing_lookup_table_fails_the_build_naming_it() -> Result<()> {
    let project = b2b_project()?;
    std::fs::remove_file(project.data_root().join("tables/T_Verbas.csv"))?;

    project
        .semmodel(&["build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("T_Verbas"));
    Ok(())
}
