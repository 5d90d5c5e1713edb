//! End-to-end tests driving the `sysmon` binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sysmon(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sysmon").unwrap();
    cmd.env_remove("SYSMON_DB")
        .env_remove("SYSMON_CONFIG")
        .arg("--db")
        .arg(db);
    cmd
}

fn measure_memory(db: &Path) {
    sysmon(db)
        .args([
            "measure",
            "--metrics",
            "memory-usage",
            "--host",
            "host1",
            "--address",
            "10.0.0.1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded 1 sample(s)"));
}

// ============================================================================
// Store lifecycle
// ============================================================================

#[test]
fn init_creates_store_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");

    sysmon(&db)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Store initialized at"));
    assert!(db.exists());

    sysmon(&db).arg("init-db").assert().success();
}

#[test]
fn show_without_store_fails_and_creates_nothing() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");

    sysmon(&db)
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
    assert!(!db.exists());
}

// ============================================================================
// Measure and show
// ============================================================================

#[test]
fn measure_then_show_average() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");
    measure_memory(&db);

    sysmon(&db)
        .args(["show", "--start", "-1h", "--metric", "memory-usage", "--average"])
        .assert()
        .success()
        .stdout(predicate::str::contains("host1"))
        .stdout(predicate::str::contains("Average(memory-usage) = "));
}

#[test]
fn show_json_lists_rows() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");
    measure_memory(&db);
    measure_memory(&db);

    let output = sysmon(&db)
        .args(["--format", "json", "show", "--limit", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], 2);
    assert_eq!(rows[0]["address"], "10.0.0.1");
}

#[test]
fn unknown_metric_fails() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");

    sysmon(&db)
        .args(["measure", "--metrics", "gpu-usage", "--host", "h", "--address", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown metric: gpu-usage"));
}

#[test]
fn malformed_window_fails() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");
    measure_memory(&db);

    sysmon(&db)
        .args(["show", "--start", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("yesterday"));
}

#[test]
fn metrics_lists_known_names() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");

    sysmon(&db)
        .arg("metrics")
        .assert()
        .success()
        .stdout(predicate::str::contains("cpu-usage"))
        .stdout(predicate::str::contains("memory-usage"))
        .stdout(predicate::str::contains("disk-0-usage"));
}

// ============================================================================
// Export and prune
// ============================================================================

#[test]
fn export_writes_header_and_rows() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");
    let out = dir.path().join("export.csv");
    measure_memory(&db);

    sysmon(&db)
        .arg("export")
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 rows to"));

    let text = std::fs::read_to_string(&out).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("timestamp,host,address,metric,value"));
    assert!(lines.next().unwrap().contains(",host1,10.0.0.1,memory-usage,"));
    assert_eq!(lines.next(), None);
}

#[test]
fn prune_keeps_recent_samples() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");
    measure_memory(&db);

    sysmon(&db)
        .args(["prune", "--retention-days", "7", "--vacuum"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 0 rows older than 7 days"))
        .stdout(predicate::str::contains("Store compacted"));

    sysmon(&db)
        .args(["--format", "json", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("memory-usage"));
}

#[test]
fn read_only_flag_rejects_prune() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.db");
    measure_memory(&db);

    sysmon(&db)
        .args(["--read-only", "prune", "--retention-days", "1"])
        .assert()
        .failure();
}

// ============================================================================
// CSV backend
// ============================================================================

#[test]
fn csv_backend_round_trip() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("metrics.csv");

    sysmon(&db).arg("init").assert().success();
    measure_memory(&db);
    measure_memory(&db);

    let text = std::fs::read_to_string(&db).unwrap();
    assert!(text.starts_with("id,timestamp,host,address,metric,value\n"));
    assert_eq!(text.lines().count(), 3);

    sysmon(&db)
        .args(["show", "--oldest-first", "--sum"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total(ALL) = "));
    assert!(!dir.path().join("metrics.csv.lock").exists());
}
