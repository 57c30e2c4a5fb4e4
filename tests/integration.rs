use std::fs;
use std::process::{Command, Output};

use serde_json::Value;

fn kbgraph(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kbgraph"))
        .args(args)
        .env("RUST_LOG", "kbgraph=warn")
        .output()
        .expect("Failed to execute kbgraph")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "kbgraph exited with error: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

fn ids(snapshot: &Value, collection: &str) -> Vec<String> {
    snapshot[collection]
        .as_array()
        .expect("missing collection")
        .iter()
        .map(|item| item["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn describe_prints_inherited_properties() {
    let output = kbgraph(&["describe", "disease"]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);

    assert!(text.starts_with("Disease\n"), "unexpected header: {text}");
    assert!(text.contains("inherits: Ontology"));
    assert!(text.contains("  sourceId: string mandatory not-null"));
    assert!(text.contains("  source: link -> Source mandatory not-null"));
    assert!(text.contains("  uuid: string mandatory not-null generator=uuid"));
}

#[test]
fn describe_rejects_unknown_class() {
    let output = kbgraph(&["describe", "Nonsense"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown class: Nonsense"));
}

#[test]
fn validate_prints_normalised_record() {
    let output = kbgraph(&[
        "validate",
        "--class",
        "Disease",
        "--record",
        "tests/fixtures/disease.json",
        "--add-defaults",
    ]);
    let record = stdout_json(&output);

    assert_eq!(record["name"], "cancer");
    assert_eq!(record["sourceId"], "doid:162");
    assert_eq!(record["source"], "#12:0");
    assert_eq!(record["subsets"], serde_json::json!(["oncology"]));
    assert_eq!(record["deprecated"], false);
    assert_eq!(record["displayName"], "cancer");
    assert!(record["uuid"].as_str().is_some_and(|uuid| uuid.len() == 36));
    assert!(record["createdAt"].is_i64());
}

#[test]
fn validate_fails_on_unexpected_attribute() {
    let output = kbgraph(&[
        "validate",
        "--class",
        "Disease",
        "--record",
        "tests/fixtures/invalid_disease.json",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Disease.colour: unexpected attribute"), "{stderr}");
}

#[test]
fn validate_drop_extra_accepts_the_same_record() {
    let output = kbgraph(&[
        "validate",
        "--class",
        "Disease",
        "--record",
        "tests/fixtures/invalid_disease.json",
        "--drop-extra",
        "--add-defaults",
    ]);
    let record = stdout_json(&output);
    assert!(record.get("colour").is_none());
    assert_eq!(record["name"], "cancer");
}

#[test]
fn explore_seed_is_marked_expandable() {
    let output = kbgraph(&[
        "explore",
        "--records",
        "tests/fixtures/records.json",
        "--seed",
        "#1:0",
    ]);
    let snapshot = stdout_json(&output);
    assert_eq!(ids(&snapshot, "nodes"), vec!["#1:0"]);
    assert!(ids(&snapshot, "links").is_empty());
    assert_eq!(snapshot["expandable"], serde_json::json!(["#1:0"]));
    assert_eq!(snapshot["nodes"][0]["label"], "cancer");
}

#[test]
fn explore_links_seeds_that_reference_each_other() {
    let output = kbgraph(&[
        "explore",
        "--records",
        "tests/fixtures/records.json",
        "--seed",
        "#1:0",
        "--seed",
        "#1:1",
    ]);
    let snapshot = stdout_json(&output);
    assert_eq!(ids(&snapshot, "nodes"), vec!["#1:0", "#1:1"]);
    assert_eq!(ids(&snapshot, "links"), vec!["#20:0"]);
    assert_eq!(snapshot["links"][0]["source"], "#1:1");
    assert_eq!(snapshot["links"][0]["target"], "#1:0");
    // the alias edge is still hidden
    assert_eq!(snapshot["expandable"], serde_json::json!(["#1:0"]));
}

#[test]
fn explore_expands_requested_nodes() {
    let output = kbgraph(&[
        "explore",
        "--records",
        "tests/fixtures/records.json",
        "--seed",
        "#1:0",
        "--expand",
        "#1:0",
    ]);
    let snapshot = stdout_json(&output);
    // alias edges sort before subclass edges
    assert_eq!(ids(&snapshot, "nodes"), vec!["#1:0", "#1:2", "#1:1"]);
    assert_eq!(ids(&snapshot, "links"), vec!["#21:0", "#20:0"]);
    assert_eq!(snapshot["expandable"], serde_json::json!([]));
    assert_eq!(snapshot["propsMap"]["linkProps"]["@class"], serde_json::json!(["AliasOf", "SubClassOf"]));
}

#[test]
fn explore_config_threshold_requires_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("explorer.yaml");
    fs::copy("tests/fixtures/explorer.yaml", &config).unwrap();
    let config = config.to_str().unwrap();

    let base = [
        "explore",
        "--records",
        "tests/fixtures/records.json",
        "--seed",
        "#1:0",
        "--expand",
        "#1:0",
        "--config",
        config,
    ];
    let output = kbgraph(&base);
    let snapshot = stdout_json(&output);
    assert_eq!(ids(&snapshot, "nodes"), vec!["#1:0"]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("rerun with --yes"));
    assert_eq!(snapshot["simulation"]["linkDistance"], 120.0);

    let mut forced = base.to_vec();
    forced.push("--yes");
    let snapshot = stdout_json(&kbgraph(&forced));
    assert_eq!(ids(&snapshot, "nodes").len(), 3);
    // labels come from the configured property
    assert_eq!(snapshot["nodes"][1]["label"], "malignant neoplasm");
}

#[test]
fn explore_reports_missing_seed() {
    let output = kbgraph(&[
        "explore",
        "--records",
        "tests/fixtures/records.json",
        "--seed",
        "#404:0",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("record not found: #404:0"));
}
