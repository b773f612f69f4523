//! End-to-end tests for the attrload binary
//!
//! These tests validate:
//! - Dry runs against the in-memory sink
//! - Success/failure output routing
//! - Schema inspection
//! - Loading through the HTTP sink

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn write_input(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("Failed to write input file");
    path
}

fn read_lines(path: &Path) -> Vec<Value> {
    if !path.exists() {
        return Vec::new();
    }
    fs::read_to_string(path)
        .expect("Failed to read output file")
        .lines()
        .map(|line| serde_json::from_str(line).expect("Output line is not JSON"))
        .collect()
}

fn attrload() -> Command {
    let mut cmd = Command::cargo_bin("attrload").unwrap();
    cmd.env_remove("ATTRLOAD_SCHEMA")
        .env_remove("ATTRLOAD_TABLE")
        .env_remove("ATTRLOAD_SERVER_URL")
        .env("LOG_OUTPUT", "console");
    cmd
}

// ============================================================================
// Dry Run Tests
// ============================================================================

#[test]
fn test_dry_run_routes_items() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        &dir,
        "in.jsonl",
        "{\"id\": 1, \"score\": \"0.5\"}\n{\"id\": 2, \"score\": \"NaN\"}\n{\"score\": \"1\"}\n{\"id\": 3}\n",
    );
    let ok = dir.path().join("ok.jsonl");
    let bad = dir.path().join("bad.jsonl");

    attrload()
        .arg("run")
        .arg("--input")
        .arg(&input)
        .arg("--success-out")
        .arg(&ok)
        .arg("--failure-out")
        .arg(&bad)
        .arg("--dry-run")
        .arg("--table")
        .arg("events")
        .arg("--schema")
        .arg("id|Long|$primary_key,score|Double")
        .arg("--batch-size")
        .arg("2")
        .assert()
        .success();

    let succeeded = read_lines(&ok);
    let failed = read_lines(&bad);
    // NaN coerces to zero, only the keyless item fails
    assert_eq!(succeeded.len(), 3);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["cause"]["stage"], "insert");
}

#[test]
fn test_dry_run_csv_input() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "in.csv", "id,name\n1,a\n2,b\n3,c\n");
    let ok = dir.path().join("ok.jsonl");
    let bad = dir.path().join("bad.jsonl");

    attrload()
        .args(["run", "--input-format", "csv", "--dry-run", "--table", "events"])
        .args(["--schema", "id|Long,name"])
        .arg("--input")
        .arg(&input)
        .arg("--success-out")
        .arg(&ok)
        .arg("--failure-out")
        .arg(&bad)
        .assert()
        .success();

    assert_eq!(read_lines(&ok).len(), 3);
    assert!(read_lines(&bad).is_empty());
}

#[test]
fn test_missing_schema_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "in.jsonl", "{\"id\": 1}\n");

    attrload()
        .args(["run", "--dry-run", "--table", "events"])
        .arg("--input")
        .arg(&input)
        .arg("--success-out")
        .arg(dir.path().join("ok.jsonl"))
        .arg("--failure-out")
        .arg(dir.path().join("bad.jsonl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no schema was configured"));
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test]
fn test_schema_command_prints_columns() {
    attrload()
        .args(["schema", "--text", "a|String|$primary_key,b|Integer|$primary_key(3)"])
        .assert()
        .success()
        .stderr(predicate::str::contains("\"name\":\"a\""))
        .stderr(predicate::str::contains("\"primary_key_ordinal\":3"));
}

#[test]
fn test_schema_command_rejects_bad_type() {
    attrload()
        .args(["schema", "--text", "a|Decimal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid data type"));
}

// ============================================================================
// HTTP Sink Tests
// ============================================================================

#[tokio::test]
async fn test_run_against_server() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/has/table"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"table_exists": true})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/show/table"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "columns": [{"name": "id", "type": "long", "annotations": []}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/insert/records"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"count_inserted": 2, "count_updated": 0})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "in.jsonl", "{\"id\": 1}\n{\"id\": 2}\n");
    let ok = dir.path().join("ok.jsonl");
    let bad = dir.path().join("bad.jsonl");

    attrload()
        .args(["run", "--table", "events"])
        .arg("--server-url")
        .arg(server.uri())
        .arg("--input")
        .arg(&input)
        .arg("--success-out")
        .arg(&ok)
        .arg("--failure-out")
        .arg(&bad)
        .assert()
        .success();

    assert_eq!(read_lines(&ok).len(), 2);
    assert!(read_lines(&bad).is_empty());
}
