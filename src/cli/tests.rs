//! Tests for cli module

use super::*;
use crate::error::Error;
use clap::Parser;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_json(value: &Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{value}").unwrap();
    file
}

fn config_file(server: &MockServer) -> NamedTempFile {
    write_json(&json!({
        "base_url": server.uri(),
        "access_token": "tok",
        "start_date": "2021-01-01T00:00:00Z"
    }))
}

fn runner(args: &[&str]) -> Runner {
    let mut argv = vec!["solidafy-helpdesk"];
    argv.extend_from_slice(args);
    Runner::new(Cli::try_parse_from(argv).unwrap())
}

async fn run_captured(runner: &Runner) -> (i32, String) {
    let mut out = Vec::new();
    let code = runner.run_to(&mut out).await.unwrap();
    (code, String::from_utf8(out).unwrap())
}

// ============================================================================
// Argument Parsing Tests
// ============================================================================

#[test]
fn test_parse_sync() {
    let cli = Cli::try_parse_from([
        "solidafy-helpdesk",
        "-C",
        "config.json",
        "sync",
        "--catalog",
        "catalog.json",
    ])
    .unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("config.json")));
    assert!(!cli.verbose);
    match cli.command {
        Commands::Sync { catalog } => assert_eq!(catalog, PathBuf::from("catalog.json")),
        other => panic!("Expected sync, got {other:?}"),
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "solidafy-helpdesk",
        "discover",
        "--config",
        "config.json",
        "--state",
        "state.json",
        "-v",
    ])
    .unwrap();

    assert!(matches!(cli.command, Commands::Discover));
    assert_eq!(cli.state, Some(PathBuf::from("state.json")));
    assert!(cli.verbose);
}

#[test]
fn test_sync_requires_catalog() {
    assert!(Cli::try_parse_from(["solidafy-helpdesk", "-C", "config.json", "sync"]).is_err());
}

#[test]
fn test_unknown_command_rejected() {
    assert!(Cli::try_parse_from(["solidafy-helpdesk", "read"]).is_err());
}

// ============================================================================
// Runner Tests
// ============================================================================

#[tokio::test]
async fn test_missing_config_flag() {
    let result = runner(&["check"]).run_to(Vec::new()).await;
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[tokio::test]
async fn test_invalid_state_json() {
    let server = MockServer::start().await;
    let config = config_file(&server);
    let runner = runner(&[
        "-C",
        config.path().to_str().unwrap(),
        "--state-json",
        "not json",
        "check",
    ]);

    assert!(runner.run_to(Vec::new()).await.is_err());
}

#[tokio::test]
async fn test_missing_catalog_file() {
    let server = MockServer::start().await;
    let config = config_file(&server);
    let runner = runner(&[
        "-C",
        config.path().to_str().unwrap(),
        "sync",
        "--catalog",
        "/nonexistent/catalog.json",
    ]);

    let err = runner.run_to(Vec::new()).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to load catalog from /nonexistent/catalog.json"));
}

#[tokio::test]
async fn test_check_reports_each_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "Forbidden"})))
        .mount(&server)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let config = config_file(&server);
    let (code, output) = run_captured(&runner(&["-C", config.path().to_str().unwrap(), "check"])).await;

    assert_eq!(code, 1);
    assert!(output.lines().any(|l| l.starts_with("tags: FAILED")));
    assert!(output.lines().any(|l| l == "users: OK"));
}

#[tokio::test]
async fn test_discover_prints_catalog() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let config = config_file(&server);
    let (code, output) =
        run_captured(&runner(&["-C", config.path().to_str().unwrap(), "discover"])).await;

    assert_eq!(code, 0);
    let catalog: Value = serde_json::from_str(&output).unwrap();
    let streams = catalog["streams"].as_array().unwrap();
    assert!(streams.iter().any(|s| s["tap_stream_id"] == "tickets"));
}

#[tokio::test]
async fn test_sync_writes_json_lines() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tags": [{"name": "vip", "count": 3}],
            "meta": {"has_more": false}
        })))
        .mount(&server)
        .await;

    let config = config_file(&server);
    let catalog = write_json(&json!({
        "streams": [{
            "tap_stream_id": "tags",
            "stream": "tags",
            "schema": {},
            "metadata": [{"breadcrumb": [], "metadata": {"selected": true}}]
        }]
    }));
    let state = NamedTempFile::new().unwrap();

    let (code, output) = run_captured(&runner(&[
        "-C",
        config.path().to_str().unwrap(),
        "--state",
        state.path().to_str().unwrap(),
        "--state-json",
        "{}",
        "sync",
        "--catalog",
        catalog.path().to_str().unwrap(),
    ]))
    .await;

    assert_eq!(code, 0);
    let types: Vec<String> = output
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap()["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, vec!["STATE", "SCHEMA", "RECORD", "STATE", "STATE"]);
    let record: Value = serde_json::from_str(output.lines().nth(2).unwrap()).unwrap();
    assert_eq!(record["record"], json!({"name": "vip", "count": 3}));
}
