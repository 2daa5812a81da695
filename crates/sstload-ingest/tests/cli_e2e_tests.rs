//! End-to-end tests for the csv2sstable binary
//!
//! These tests run the compiled binary against temporary inputs and check:
//! - Required flags and usage errors
//! - Rows landing under <output>/<keyspace>/<table>
//! - The per-row debug trace
//! - Exit codes for failed lines, rejected rows and fatal errors

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const CQL: &str = "CREATE TABLE ks.events (id int PRIMARY KEY, tags list<text>, seen timestamp)";

/// Helper to write an input file and return its path
fn write_input(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("events.csv");
    std::fs::write(&path, content).unwrap();
    path
}

/// Helper to build a command with the common flags set
fn csv2sstable(input: &Path, output: &Path) -> Command {
    csv2sstable_with_mapping(input, output, "id:0,tags:1,seen:2")
}

fn csv2sstable_with_mapping(input: &Path, output: &Path, mapping: &str) -> Command {
    let mut cmd = Command::cargo_bin("csv2sstable").unwrap();
    cmd.env("LOG_LEVEL", "warn")
        .env_remove("SSTLOAD_DELIMITER")
        .env_remove("SSTLOAD_LIST_DELIMITER")
        .env_remove("SSTLOAD_QUOTE")
        .env_remove("SSTLOAD_FAIL_FAST")
        .args(["--cql", CQL, "--mapping", mapping])
        .arg("--csv")
        .arg(input)
        .arg("--output")
        .arg(output)
        .args(["--delimiter", ",", "--list-delimiter", ":"]);
    cmd
}

fn data_rows(output: &Path) -> Vec<serde_json::Value> {
    let data = std::fs::read_to_string(output.join("ks/events/ks-events-1-Data.jsonl")).unwrap();
    data.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
}

// ============================================================================
// Usage Tests
// ============================================================================

#[test]
fn test_missing_required_flag() {
    Command::cargo_bin("csv2sstable")
        .unwrap()
        .args(["--cql", CQL, "--mapping", "id:0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--csv"));
}

#[test]
fn test_help() {
    Command::cargo_bin("csv2sstable")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--mapping"))
        .stdout(predicate::str::contains("--list-delimiter"));
}

// ============================================================================
// Load Tests
// ============================================================================

#[test]
fn test_load_success() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "7,a:b:c,2020-01-02 03:04:05\n8,,\n");
    let output = dir.path().join("out");

    csv2sstable(&input, &output).assert().success();

    let rows = data_rows(&output);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], 7);
    assert_eq!(rows[0]["tags"], serde_json::json!(["a", "b", "c"]));
    assert_eq!(rows[0]["seen"], 1577934245000i64);
    assert!(rows[1]["tags"].is_null());
}

#[test]
fn test_debug_trace() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "7,a:b,2020-01-02 03:04:05\n");
    let output = dir.path().join("out");

    csv2sstable(&input, &output)
        .arg("--debug")
        .assert()
        .success()
        .stdout(predicate::str::contains("----------------- ROW 1 -----------------"))
        .stdout(predicate::str::contains("Field: id, Type: int, Value: 7"))
        .stdout(predicate::str::contains("Field: tags, Type: list<text>, Value: [a, b]"))
        .stdout(predicate::str::contains(
            "Field: seen, Type: timestamp, Value: 2020-01-02 03:04:05",
        ));
}

#[test]
fn test_failed_rows_exit_code() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "1,a,\nnot-a-number,b,\n3,c,\n");
    let output = dir.path().join("out");

    csv2sstable(&input, &output).assert().code(3);

    let ids: Vec<i64> = data_rows(&output).iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, [1, 3]);
}

#[test]
fn test_rejected_rows_exit_success() {
    let dir = TempDir::new().unwrap();
    // An empty id is a null partition key, which the writer rejects
    let input = write_input(&dir, "1,a,\n,b,\n");
    let output = dir.path().join("out");

    csv2sstable(&input, &output).assert().success();

    let rows = data_rows(&output);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], 1);
}

#[test]
fn test_fail_fast() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "1,a,\nnot-a-number,b,\n3,c,\n");
    let output = dir.path().join("out");

    csv2sstable(&input, &output)
        .arg("--fail-fast")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("line 2"));

    assert_eq!(data_rows(&output).len(), 1);
}

#[test]
fn test_malformed_mapping_is_fatal() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "1,a,\n");
    let output = dir.path().join("out");

    csv2sstable_with_mapping(&input, &output, "id:0,tags")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("malformed mapping"));

    assert!(!output.exists());
}

#[test]
fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out");

    csv2sstable(&dir.path().join("absent.csv"), &output)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot open input"));
}
