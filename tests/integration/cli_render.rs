#![allow(missing_docs)]

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

use common::{catalog, seq_scan_stmt};

fn write_bundle(dir: &Path, bundle: &Value) -> PathBuf {
    let path = dir.join("plan.json");
    fs::write(&path, serde_json::to_vec_pretty(bundle).expect("encode bundle")).expect("write bundle");
    path
}

fn seq_scan_bundle(dir: &Path) -> PathBuf {
    let bundle = json!({
        "statement": serde_json::to_value(seq_scan_stmt()).expect("encode statement"),
        "catalog": serde_json::to_value(catalog()).expect("encode catalog"),
        "query_text": "SELECT * FROM vegetables WHERE id > 1",
        "run": { "processed": 422, "elapsed_ms": 12.5 },
    });
    write_bundle(dir, &bundle)
}

fn stdout_of(args: &[&str], bundle: &Path) -> String {
    let output = cargo_bin_cmd!("plantree")
        .env_remove("PLANTREE_FORMAT")
        .env_remove("PLANTREE_CONFIG")
        .args(args)
        .arg(bundle)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).expect("utf8 stdout")
}

#[test]
fn renders_text_by_default() {
    let dir = TempDir::new().expect("tempdir");
    let bundle = seq_scan_bundle(dir.path());
    let stdout = stdout_of(&[], &bundle);
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        [
            "Seq Scan on vegetables  (cost=0.00..25.88 rows=423 width=36)",
            "  Filter: (id > 1)",
        ]
    );
}

#[test]
fn json_format_is_machine_readable() {
    let dir = TempDir::new().expect("tempdir");
    let bundle = seq_scan_bundle(dir.path());
    let stdout = stdout_of(&["--format", "json"], &bundle);
    let doc: Value = serde_json::from_str(stdout.trim_end()).expect("valid json");
    assert_eq!(doc["Plan"]["Node Type"], "Seq Scan");
    assert_eq!(doc["Plan"]["Relation Name"], "vegetables");
}

#[test]
fn debug_flag_enables_the_extension() {
    let dir = TempDir::new().expect("tempdir");
    let bundle = seq_scan_bundle(dir.path());
    let stdout = stdout_of(&["--debug", "--no-costs"], &bundle);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "Seq Scan on vegetables");
    assert!(lines.contains(&"  Plan Node ID: 0"));
    assert!(lines.contains(&"PlannedStmt:"));
}

#[test]
fn auto_explain_replays_the_run() {
    let dir = TempDir::new().expect("tempdir");
    let bundle = seq_scan_bundle(dir.path());
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        "[auto_explain]\nlog_min_duration = \"10ms\"\nlog_verbose = true\n",
    )
    .expect("write config");

    let config_arg = config.to_string_lossy().into_owned();
    let stdout = stdout_of(&["--auto-explain", "--config", &config_arg], &bundle);
    let mut lines = stdout.lines();
    let first = lines.next().expect("log line");
    assert!(first.starts_with("LOG: duration: "), "{first}");
    assert!(first.ends_with(" ms  plan:"), "{first}");
    assert_eq!(
        lines.next(),
        Some("Query Text: SELECT * FROM vegetables WHERE id > 1")
    );
    assert_eq!(
        lines.next(),
        Some("Seq Scan on public.vegetables  (cost=0.00..25.88 rows=423 width=36)")
    );
}

#[test]
fn auto_explain_below_threshold_logs_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let bundle = seq_scan_bundle(dir.path());
    let config = dir.path().join("config.toml");
    fs::write(&config, "[auto_explain]\nlog_min_duration = \"1s\"\n").expect("write config");

    let output = cargo_bin_cmd!("plantree")
        .env_remove("PLANTREE_CONFIG")
        .args(["--auto-explain", "--config"])
        .arg(&config)
        .arg(&bundle)
        .assert()
        .success()
        .get_output()
        .clone();
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("auto_explain logged nothing"));
}

#[test]
fn missing_bundle_fails() {
    let dir = TempDir::new().expect("tempdir");
    let output = cargo_bin_cmd!("plantree")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: "), "{stderr}");
}

#[test]
fn unknown_bundle_fields_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let mut bundle = json!({
        "statement": serde_json::to_value(seq_scan_stmt()).expect("encode statement"),
    });
    bundle["flavour"] = json!("mint");
    let path = write_bundle(dir.path(), &bundle);
    let output = cargo_bin_cmd!("plantree")
        .arg(&path)
        .assert()
        .failure()
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("flavour"), "{stderr}");
}
