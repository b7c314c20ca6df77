// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::panic)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use flowplan_dry_tests::scenarios::{source_row, window_row};
use flowplan_dry_tests::{session_window_pipeline, table_id, TableMode, DEFAULT_SESSION_GAP_MS};
use predicates::prelude::*;
use tempfile::TempDir;

fn flowplan(config: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("flowplan").unwrap();
    cmd.env("RUST_LOG", "warn")
        .arg("--config-dir")
        .arg(config.path());
    cmd
}

fn write_graph(dir: &Path, mode: TableMode) -> PathBuf {
    let graph = session_window_pipeline(DEFAULT_SESSION_GAP_MS, mode);
    let path = dir.join("optimized.json");
    std::fs::write(&path, flowplan_codec::serialize(&graph).unwrap()).unwrap();
    path
}

fn compile_to(config: &TempDir, input: &Path, output: &Path) {
    flowplan(config)
        .arg("compile")
        .arg(input)
        .arg("-o")
        .arg(output)
        .assert()
        .success()
        .stdout(predicate::str::contains("compiled 7 nodes (7 stable ids)"));
}

fn write_catalog(dir: &Path, with_sink: bool) -> PathBuf {
    let mut tables = vec![serde_json::json!({
        "identifier": table_id("T"),
        "schema": source_row(),
    })];
    if with_sink {
        tables.push(serde_json::json!({
            "identifier": table_id("S"),
            "schema": window_row(),
        }));
    }
    let path = dir.join(if with_sink { "catalog.json" } else { "catalog-no-s.json" });
    let doc = serde_json::json!({ "tables": tables });
    std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
    path
}

#[test]
fn compile_then_validate_persisted_plan() {
    let config = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = write_graph(work.path(), TableMode::Persisted);
    let plan = work.path().join("plan.json");
    compile_to(&config, &input, &plan);

    flowplan(&config)
        .arg("validate")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ok: 7 nodes, engine 1.2.0"));
}

#[test]
fn compile_without_output_prints_document() {
    let config = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = write_graph(work.path(), TableMode::Persisted);

    flowplan(&config)
        .arg("compile")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stableId\""));
}

#[test]
fn compile_refuses_to_overwrite_unless_asked() {
    let config = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = write_graph(work.path(), TableMode::Persisted);
    let plan = work.path().join("plan.json");
    compile_to(&config, &input, &plan);

    flowplan(&config)
        .arg("compile")
        .arg(&input)
        .arg("-o")
        .arg(&plan)
        .assert()
        .failure()
        .stderr(predicate::str::contains("[PLAN_FILE_EXISTS]"));

    flowplan(&config)
        .arg("compile")
        .arg(&input)
        .arg("-o")
        .arg(&plan)
        .arg("--ignore-if-exists")
        .assert()
        .success();
}

#[test]
fn live_plan_needs_its_tables_in_the_catalog() {
    let config = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = write_graph(work.path(), TableMode::Live);
    let plan = work.path().join("plan.json");
    compile_to(&config, &input, &plan);

    let full = write_catalog(work.path(), true);
    flowplan(&config)
        .arg("validate")
        .arg(&plan)
        .arg("--catalog")
        .arg(&full)
        .assert()
        .success();

    let partial = write_catalog(work.path(), false);
    flowplan(&config)
        .arg("validate")
        .arg(&plan)
        .arg("--catalog")
        .arg(&partial)
        .assert()
        .failure()
        .stderr(predicate::str::contains("[CATALOG_OBJECT_UNRESOLVED]"));
}

#[test]
fn explain_prints_tree_and_ids() {
    let config = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = write_graph(work.path(), TableMode::Persisted);
    let plan = work.path().join("plan.json");
    compile_to(&config, &input, &plan);

    flowplan(&config)
        .arg("explain")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("== Compiled Plan (engine 1.2.0) =="))
        .stdout(predicate::str::contains("== Stable Ids =="));
}

#[test]
fn rederive_reports_no_drift_for_fresh_plan() {
    let config = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = write_graph(work.path(), TableMode::Persisted);
    let plan = work.path().join("plan.json");
    compile_to(&config, &input, &plan);

    flowplan(&config)
        .arg("rederive")
        .arg(&plan)
        .assert()
        .success()
        .stdout("no drift\n");
}

#[test]
fn newer_engine_version_flag_is_rejected_by_older_plan_reader() {
    let config = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = write_graph(work.path(), TableMode::Persisted);
    let plan = work.path().join("plan.json");
    compile_to(&config, &input, &plan);

    flowplan(&config)
        .args(["--engine-version", "1.1.0", "validate"])
        .arg(&plan)
        .assert()
        .failure()
        .stderr(predicate::str::contains("[UNSUPPORTED_PLAN_VERSION]"));
}

#[test]
fn engine_version_lists_supported_range() {
    let config = TempDir::new().unwrap();
    flowplan(&config)
        .arg("engine-version")
        .assert()
        .success()
        .stdout("current: 1.2.0\noldest supported: 1.0.0\n");
}

#[test]
fn prefs_set_persists_between_runs() {
    let config = TempDir::new().unwrap();
    flowplan(&config)
        .args(["prefs", "set", "--unknown-nodes", "skip-optional", "--log-filter", "debug"])
        .assert()
        .success();

    flowplan(&config)
        .args(["prefs", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"unknownNodes\": \"skip-optional\""))
        .stdout(predicate::str::contains("\"logFilter\": \"debug\""));
    assert!(config.path().join("planner.json").exists());
}
