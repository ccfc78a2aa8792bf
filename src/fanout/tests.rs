//! Tests for the tickets fan-out

use super::*;
use crate::config::TapConfig;
use crate::error::{ErrorClass, Result};
use crate::http::{HttpClient, RecordingSleeper};
use crate::state::StateManager;
use crate::streams::{Stream, StreamEvent, SyncContext};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TICKETS_PATH: &str = "/incremental/tickets/cursor.json";
const AUDITS_PATH: &str = r"^/tickets/\d+/audits\.json$";

fn context(server: &MockServer, sleeper: Arc<RecordingSleeper>, fan_out: FanOutConfig) -> SyncContext {
    let config = TapConfig::from_value(json!({
        "base_url": server.uri(),
        "access_token": "tok",
        "start_date": "2021-01-01T00:00:00Z"
    }))
    .unwrap();
    let client = HttpClient::with_config(config.http_config_with_sleeper(sleeper)).unwrap();
    SyncContext::new(client, config, StateManager::in_memory()).with_fan_out(fan_out)
}

fn ticket(id: i64) -> Value {
    json!({
        "id": id,
        "status": "open",
        "generated_timestamp": 1614556800 + id,
        "updated_at": "2021-03-01T00:00:00Z",
        "fields": [{"id": 1, "value": null}],
        "metric_set": {"id": 500 + id, "ticket_id": id}
    })
}

fn audit(id: i64) -> Value {
    json!({
        "id": id,
        "created_at": "2021-03-01T00:00:00Z",
        "via": {"channel": "web"},
        "events": [
            {"id": id * 10, "type": "Comment", "body": "hello"},
            {"id": id * 10 + 1, "type": "Change", "field_name": "status"}
        ]
    })
}

async fn mount_tickets(server: &MockServer, tickets: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(TICKETS_PATH))
        .and(query_param("include", "metric_sets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tickets": tickets,
            "after_cursor": "c1",
            "end_of_stream": true
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_audits(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path_regex(AUDITS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "audits": [audit(1)],
            "next_page": null
        })))
        .expect(expected)
        .mount(server)
        .await;
}

fn tickets_stream(selected: &[&str]) -> Stream {
    Stream::from_registry("tickets", |n| selected.contains(&n)).unwrap()
}

async fn run(stream: &Stream, ctx: &SyncContext) -> Vec<Result<StreamEvent>> {
    stream.sync(ctx).collect().await
}

fn records_of(events: &[Result<StreamEvent>], name: &str) -> Vec<Value> {
    events
        .iter()
        .filter_map(|e| match e {
            Ok(StreamEvent::Record { stream, record }) if *stream == name => Some(record.clone()),
            _ => None,
        })
        .collect()
}

fn checkpoints(events: &[Result<StreamEvent>]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Ok(StreamEvent::Checkpoint)))
        .count()
}

// ============================================================================
// Wave Tests
// ============================================================================

#[tokio::test]
async fn test_checkpoint_after_every_wave() {
    let server = MockServer::start().await;
    mount_tickets(&server, (1..=9).map(ticket).collect()).await;
    mount_audits(&server, 9).await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let ctx = context(&server, sleeper.clone(), FanOutConfig::new(2, 450));
    let stream = tickets_stream(&["tickets", TICKET_AUDITS, TICKET_COMMENTS]);
    let events = run(&stream, &ctx).await;

    assert!(events.iter().all(Result::is_ok));
    assert_eq!(checkpoints(&events), 5);
    assert!(matches!(events.last(), Some(Ok(StreamEvent::Checkpoint))));
    assert_eq!(records_of(&events, "tickets").len(), 9);
    assert_eq!(records_of(&events, TICKET_AUDITS).len(), 9);
    assert_eq!(records_of(&events, TICKET_COMMENTS).len(), 9);
    assert_eq!(sleeper.count(), 0);

    assert_eq!(
        ctx.state.raw_bookmark("tickets", "generated_timestamp").await,
        Some(json!("2021-03-01T00:00:09Z"))
    );
}

#[tokio::test]
async fn test_wave_keeps_ticket_order() {
    let server = MockServer::start().await;
    mount_tickets(&server, (1..=3).map(ticket).collect()).await;

    for id in 1..=3_i64 {
        Mock::given(method("GET"))
            .and(path(format!("/tickets/{id}/audits.json")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"audits": [audit(id)]}))
                    .set_delay(Duration::from_millis(((4 - id) * 50) as u64)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let ctx = context(
        &server,
        Arc::new(RecordingSleeper::new()),
        FanOutConfig::new(3, 450),
    );
    let events = run(&tickets_stream(&[TICKET_AUDITS]), &ctx).await;

    let audit_ids: Vec<i64> = records_of(&events, TICKET_AUDITS)
        .iter()
        .map(|a| a["id"].as_i64().unwrap())
        .collect();
    assert_eq!(audit_ids, vec![1, 2, 3]);
    assert_eq!(checkpoints(&events), 1);
}

#[tokio::test]
async fn test_audits_follow_next_page_per_ticket() {
    let server = MockServer::start().await;
    mount_tickets(&server, vec![ticket(1)]).await;
    let next = format!("{}/tickets/1/audits.json?page=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/tickets/1/audits.json"))
        .and(query_param("per_page", "100"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "audits": [audit(1), audit(2)],
            "next_page": next
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tickets/1/audits.json"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "audits": [audit(3)],
            "next_page": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(
        &server,
        Arc::new(RecordingSleeper::new()),
        FanOutConfig::new(5, 450),
    );
    let events = run(&tickets_stream(&[TICKET_AUDITS, TICKET_COMMENTS]), &ctx).await;

    assert!(events.iter().all(Result::is_ok));
    assert_eq!(records_of(&events, TICKET_AUDITS), vec![audit(1), audit(2), audit(3)]);
    let comment_ids: Vec<i64> = records_of(&events, TICKET_COMMENTS)
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(comment_ids, vec![10, 20, 30]);
    assert!(records_of(&events, TICKET_COMMENTS)
        .iter()
        .all(|c| c["ticket_id"] == json!(1)));
}

#[tokio::test]
async fn test_quota_window_sleeps_between_waves() {
    let server = MockServer::start().await;
    mount_tickets(&server, (1..=5).map(ticket).collect()).await;
    mount_audits(&server, 5).await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let ctx = context(&server, sleeper.clone(), FanOutConfig::new(2, 4));
    let events = run(&tickets_stream(&[TICKET_AUDITS]), &ctx).await;

    assert_eq!(records_of(&events, TICKET_AUDITS).len(), 5);
    let sleeps = sleeper.sleeps();
    assert_eq!(sleeps.len(), 1);
    assert!(sleeps[0] > Duration::from_secs(60));
    assert!(sleeps[0] <= Duration::from_secs(62));
}

// ============================================================================
// Per-ticket Tests
// ============================================================================

#[tokio::test]
async fn test_deleted_ticket_skips_sub_resources() {
    let server = MockServer::start().await;
    let mut deleted = ticket(2);
    deleted["status"] = json!("deleted");
    mount_tickets(&server, vec![ticket(1), deleted, ticket(3)]).await;

    Mock::given(method("GET"))
        .and(path("/tickets/2/audits.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audits": []})))
        .expect(0)
        .mount(&server)
        .await;
    mount_audits(&server, 2).await;

    let ctx = context(
        &server,
        Arc::new(RecordingSleeper::new()),
        FanOutConfig::new(5, 450),
    );
    let stream = tickets_stream(&["tickets", TICKET_AUDITS, TICKET_METRICS]);
    let events = run(&stream, &ctx).await;

    assert_eq!(records_of(&events, "tickets").len(), 3);
    let metrics: Vec<i64> = records_of(&events, TICKET_METRICS)
        .iter()
        .map(|m| m["ticket_id"].as_i64().unwrap())
        .collect();
    assert_eq!(metrics, vec![1, 3]);
    assert_eq!(records_of(&events, TICKET_AUDITS).len(), 2);
}

#[tokio::test]
async fn test_missing_audits_are_absorbed() {
    let server = MockServer::start().await;
    mount_tickets(&server, vec![ticket(1), ticket(2)]).await;

    Mock::given(method("GET"))
        .and(path("/tickets/1/audits.json"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "RecordNotFound"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tickets/2/audits.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audits": [audit(7)]})))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(
        &server,
        Arc::new(RecordingSleeper::new()),
        FanOutConfig::new(2, 450),
    );
    let events = run(&tickets_stream(&[TICKET_AUDITS, TICKET_COMMENTS]), &ctx).await;

    assert!(events.iter().all(Result::is_ok));
    assert_eq!(records_of(&events, TICKET_AUDITS), vec![audit(7)]);
    assert_eq!(records_of(&events, TICKET_COMMENTS)[0]["ticket_id"], json!(2));
    assert_eq!(checkpoints(&events), 1);
}

#[tokio::test]
async fn test_auth_failure_aborts_stream() {
    let server = MockServer::start().await;
    mount_tickets(&server, vec![ticket(1), ticket(2)]).await;

    Mock::given(method("GET"))
        .and(path_regex(AUDITS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let ctx = context(
        &server,
        Arc::new(RecordingSleeper::new()),
        FanOutConfig::new(2, 450),
    );
    let events = run(&tickets_stream(&["tickets", TICKET_AUDITS]), &ctx).await;

    assert_eq!(records_of(&events, "tickets").len(), 2);
    assert_eq!(checkpoints(&events), 0);
    let err = events.last().unwrap().as_ref().unwrap_err();
    assert_eq!(err.class(), ErrorClass::ClientError);
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_no_sub_streams_selected_makes_no_audit_calls() {
    let server = MockServer::start().await;
    mount_tickets(&server, (1..=3).map(ticket).collect()).await;
    mount_audits(&server, 0).await;

    let ctx = context(
        &server,
        Arc::new(RecordingSleeper::new()),
        FanOutConfig::new(2, 450),
    );
    let events = run(&tickets_stream(&["tickets"]), &ctx).await;

    let tickets = records_of(&events, "tickets");
    assert_eq!(tickets.len(), 3);
    assert!(tickets.iter().all(|t| t.get("fields").is_none()));
    assert_eq!(checkpoints(&events), 2);
    assert_eq!(
        ctx.state.raw_bookmark("tickets", "generated_timestamp").await,
        Some(json!("2021-03-01T00:00:03Z"))
    );
}

#[tokio::test]
async fn test_metrics_without_tickets_still_advance_bookmark() {
    let server = MockServer::start().await;
    let mut no_metrics = ticket(2);
    no_metrics["metric_set"] = Value::Null;
    mount_tickets(&server, vec![ticket(1), no_metrics]).await;

    let ctx = context(
        &server,
        Arc::new(RecordingSleeper::new()),
        FanOutConfig::new(20, 450),
    );
    let events = run(&tickets_stream(&[TICKET_METRICS]), &ctx).await;

    assert!(records_of(&events, "tickets").is_empty());
    assert_eq!(
        records_of(&events, TICKET_METRICS),
        vec![json!({"id": 501, "ticket_id": 1})]
    );
    assert_eq!(
        ctx.state.raw_bookmark("tickets", "generated_timestamp").await,
        Some(json!("2021-03-01T00:00:02Z"))
    );
}

#[tokio::test]
async fn test_side_conversations_per_ticket() {
    let server = MockServer::start().await;
    mount_tickets(&server, vec![ticket(1)]).await;

    Mock::given(method("GET"))
        .and(path("/tickets/1/side_conversations"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "side_conversations": [
                {"id": "a", "updated_at": "2021-04-01T00:00:00Z"},
                {"id": "b", "updated_at": "2020-04-01T00:00:00Z"}
            ],
            "next_page": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(
        &server,
        Arc::new(RecordingSleeper::new()),
        FanOutConfig::new(20, 450),
    );
    let events = run(&tickets_stream(&[SIDE_CONVERSATIONS]), &ctx).await;

    let conversations = records_of(&events, SIDE_CONVERSATIONS);
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["id"], json!("a"));
    assert_eq!(
        ctx.state.raw_bookmark(SIDE_CONVERSATIONS, "updated_at").await,
        Some(json!("2021-04-01T00:00:00Z"))
    );
}

#[tokio::test]
async fn test_replay_skips_ticket_at_bookmark() {
    let server = MockServer::start().await;
    mount_tickets(&server, vec![ticket(2), ticket(3)]).await;

    Mock::given(method("GET"))
        .and(path("/tickets/2/audits.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audits": [audit(2)]})))
        .expect(0)
        .mount(&server)
        .await;
    mount_audits(&server, 1).await;

    let ctx = context(
        &server,
        Arc::new(RecordingSleeper::new()),
        FanOutConfig::new(5, 450),
    );
    let bookmark: chrono::DateTime<chrono::Utc> = "2021-03-01T00:00:02Z".parse().unwrap();
    ctx.state
        .seed_bookmark("tickets", "generated_timestamp", bookmark)
        .await;
    let events = run(&tickets_stream(&["tickets", TICKET_AUDITS]), &ctx).await;

    let tickets = records_of(&events, "tickets");
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0]["id"], json!(3));
    assert_eq!(records_of(&events, TICKET_AUDITS).len(), 1);
    assert_eq!(
        ctx.state.raw_bookmark("tickets", "generated_timestamp").await,
        Some(json!("2021-03-01T00:00:03Z"))
    );
}

// ============================================================================
// Comment Tests
// ============================================================================

#[test]
fn test_comments_from_audit() {
    let comments = comments_from_audit(&audit(3), &json!(42));
    assert_eq!(
        comments,
        vec![json!({
            "id": 30,
            "type": "Comment",
            "body": "hello",
            "created_at": "2021-03-01T00:00:00Z",
            "via": {"channel": "web"},
            "metadata": null,
            "ticket_id": 42
        })]
    );
}

#[test]
fn test_comments_from_audit_without_events() {
    assert!(comments_from_audit(&json!({"id": 1}), &json!(1)).is_empty());
}

#[test]
fn test_activity_selection() {
    assert!(!ActivitySelection { audits: false, comments: false }.any());
    assert!(ActivitySelection { audits: false, comments: true }.any());
    assert!(TicketActivity::default().is_empty());
}

#[test]
fn test_fan_out_defaults() {
    let config = TapConfig::from_value(json!({
        "subdomain": "acme",
        "access_token": "tok",
        "start_date": "2021-01-01T00:00:00Z",
        "concurrency_limit": 5
    }))
    .unwrap();
    assert_eq!(FanOutConfig::from_config(&config), FanOutConfig::new(5, 450));
    assert_eq!(FanOutConfig::default(), FanOutConfig::new(20, 450));
}
