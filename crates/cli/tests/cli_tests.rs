//! CLI integration tests

use chrono::Utc;
use engine_lib::{
    policy::{PolicyConfig, PolicyEngine, PolicyInput},
    DecisionRecord, FailureMode, ModelScores, Observation,
};
use mockito::Matcher;
use serde_json::json;
use std::process::{Command, Output};

fn amos(home: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_amos"))
        .args(args)
        .env("HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("AMOS_API_URL")
        .output()
        .expect("Failed to execute amos")
}

fn record(sequence_index: u64, failure_probability: f64, remaining_life_min: f64) -> DecisionRecord {
    let engine = PolicyEngine::new(PolicyConfig::default()).unwrap();
    let decision = engine.decide(
        &PolicyInput {
            failure_probability,
            failure_mode: FailureMode::Twf,
            remaining_life_min,
            anomaly_score: 0.4,
            anomaly_flag: false,
        },
        Utc::now(),
    );
    DecisionRecord {
        sequence_index,
        observation: Observation {
            udi: Some(sequence_index + 1),
            torque_nm: Some(40.0),
            ..Default::default()
        },
        scores: ModelScores {
            anomaly_score: 0.4,
            anomaly_flag: false,
            failure_probability,
            failure_flag: failure_probability >= 0.35,
            failure_mode: FailureMode::Twf,
            failure_mode_confidence: 0.6,
            failure_mode_probabilities: vec![(FailureMode::Normal, 0.4), (FailureMode::Twf, 0.6)],
            remaining_life_min,
            energy_estimate: 6.2,
        },
        priority: PolicyEngine::priority_rank(&decision),
        decision,
        processed_at: Utc::now(),
        inference_us: 850,
    }
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let home = tempfile::tempdir().unwrap();
    let output = amos(home.path(), &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("AMOS predictive maintenance"), "Should show app name");
    for command in ["decisions", "critical", "show", "summary", "health", "submit", "decide"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("AMOS_API_URL"), "Should show env var");
    assert!(stdout.contains("--format"), "Should show format option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let home = tempfile::tempdir().unwrap();
    let output = amos(home.path(), &["--version"]);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(String::from_utf8_lossy(&output.stdout).contains("amos"));
}

#[test]
fn test_decide_json_is_critical() {
    let home = tempfile::tempdir().unwrap();
    let output = amos(
        home.path(),
        &["--format", "json", "decide", "--probability", "0.8", "--rul", "100"],
    );

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["action"], "critical_immediate");
    assert_eq!(value["priority"], 1);
}

#[test]
fn test_decide_table_investigates_anomaly() {
    let home = tempfile::tempdir().unwrap();
    let output = amos(
        home.path(),
        &[
            "decide",
            "--probability",
            "0.1",
            "--rul",
            "200",
            "--mode",
            "normal",
            "--anomaly-flag",
        ],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[P3] INVESTIGATE"));
    assert!(stdout.contains("Reasoning:"));
}

#[test]
fn test_decide_accepts_overdue_rul() {
    let home = tempfile::tempdir().unwrap();
    let output = amos(
        home.path(),
        &["--format", "json", "decide", "--probability", "0.1", "--rul", "-5"],
    );

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["action"], "critical_immediate");
}

#[test]
fn test_decide_rejects_bad_probability() {
    let home = tempfile::tempdir().unwrap();
    let output = amos(home.path(), &["decide", "--probability", "1.5", "--rul", "100"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--probability"));
}

#[test]
fn test_decisions_uses_limit() {
    let mut server = mockito::Server::new();
    let body = serde_json::to_string(&vec![record(8, 0.2, 200.0), record(9, 0.8, 20.0)]).unwrap();
    let mock = server
        .mock("GET", "/api/v1/decisions")
        .match_query(Matcher::UrlEncoded("limit".into(), "2".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create();

    let home = tempfile::tempdir().unwrap();
    let url = server.url();
    let output = amos(
        home.path(),
        &["--api-url", &url, "--format", "json", "decisions", "--limit", "2"],
    );

    mock.assert();
    assert!(output.status.success());
    let records: Vec<DecisionRecord> = serde_json::from_slice(&output.stdout).unwrap();
    let seqs: Vec<u64> = records.iter().map(|r| r.sequence_index).collect();
    assert_eq!(seqs, vec![8, 9]);
}

#[test]
fn test_critical_table() {
    let mut server = mockito::Server::new();
    let body = serde_json::to_string(&vec![record(3, 0.9, 10.0)]).unwrap();
    let _mock = server
        .mock("GET", "/api/v1/decisions/critical")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create();

    let home = tempfile::tempdir().unwrap();
    let url = server.url();
    let output = amos(home.path(), &["--api-url", &url, "critical"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("critical_immediate"));
    assert!(stdout.contains("Total: 1 decisions"));
}

#[test]
fn test_show_missing_decision_fails() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/api/v1/decisions/99")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"No retained decision with sequence 99","kind":"not_found"}"#)
        .create();

    let home = tempfile::tempdir().unwrap();
    let url = server.url();
    let output = amos(home.path(), &["--api-url", &url, "show", "99"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("404"));
    assert!(stderr.contains("No retained decision with sequence 99"));
}

#[test]
fn test_health_reports_unhealthy_engine() {
    let mut server = mockito::Server::new();
    let body = json!({
        "status": "unhealthy",
        "components": {
            "ingestion": {
                "status": "unhealthy",
                "message": "stream closed",
                "updated_at": "2024-03-01T08:00:00Z"
            },
            "models": { "status": "healthy", "updated_at": "2024-03-01T08:00:00Z" }
        }
    });
    let _mock = server
        .mock("GET", "/healthz")
        .with_status(503)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create();

    let home = tempfile::tempdir().unwrap();
    let url = server.url();
    let output = amos(home.path(), &["--api-url", &url, "health"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unhealthy"));
    assert!(stdout.contains("stream closed"));
}

#[test]
fn test_submit_posts_observation() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/v1/observations")
        .match_body(Matcher::PartialJson(json!({
            "sequence_index": 4,
            "observation": { "product_type": "L", "tool_wear_min": 120.0 }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::to_string(&record(4, 0.1, 133.0)).unwrap())
        .create();

    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("observation.json");
    std::fs::write(&file, r#"{"product_type":"L","tool_wear_min":120.0}"#).unwrap();

    let url = server.url();
    let output = amos(
        home.path(),
        &["--api-url", &url, "submit", file.to_str().unwrap(), "--sequence", "4"],
    );

    mock.assert();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("recorded as #4"));
}

#[test]
fn test_api_url_from_config_file() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/v1/summary")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"records":0,"anomaly_count":0,"failure_alerts":0,"critical_count":0,"mean_remaining_life_min":null,"total_actionable_cost":0.0,"by_action":[],"failure_modes":{},"latest_sequence":null}"#)
        .create();

    let home = tempfile::tempdir().unwrap();
    let config_dir = home.path().join(".config").join("amos");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.json"),
        json!({ "api_url": server.url() }).to_string(),
    )
    .unwrap();

    let output = amos(home.path(), &["summary"]);

    mock.assert();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No decisions recorded yet"));
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let home = tempfile::tempdir().unwrap();
    let output = amos(home.path(), &["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error") || stderr.contains("invalid"));
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let home = tempfile::tempdir().unwrap();
    let output = amos(home.path(), &["submit", "obs.json"]);

    assert!(!output.status.success(), "Missing --sequence should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("required") || stderr.contains("error"));
}
