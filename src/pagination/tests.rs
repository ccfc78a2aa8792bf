//! Tests for pagination module

use super::*;
use crate::error::{Error, ErrorClass};
use crate::http::{HttpClient, HttpClientConfig, RecordingSleeper};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn client_for(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .sleeper(Arc::new(RecordingSleeper::new()))
        .build();
    HttpClient::with_config(config).unwrap()
}

// ============================================================================
// NextPage Tests
// ============================================================================

#[test]
fn test_next_page_with_params() {
    let next = NextPage::with_params(params(&[("cursor", "abc")]));
    assert!(next.is_continue());
    assert!(!next.is_done());
    assert_eq!(
        next,
        NextPage::Continue {
            query_params: params(&[("cursor", "abc")]),
            url: None,
        }
    );
}

#[test]
fn test_next_page_with_url() {
    let next = NextPage::with_url("https://acme.zendesk.com/api/v2/brands?page=2");
    if let NextPage::Continue { query_params, url } = next {
        assert!(query_params.is_empty());
        assert_eq!(
            url.as_deref(),
            Some("https://acme.zendesk.com/api/v2/brands?page=2")
        );
    } else {
        panic!("Expected Continue");
    }
}

// ============================================================================
// Strategy Tests
// ============================================================================

#[test]
fn test_cursor_paginator_params() {
    let paginator = CursorPaginator::new(100, params(&[("start_time", "1609459200")]));
    assert_eq!(
        paginator.initial_params(),
        params(&[("page[size]", "100"), ("start_time", "1609459200")])
    );

    let mut state = PaginationState::new();
    let next = paginator
        .process_response(
            &json!({"meta": {"has_more": true, "after_cursor": "c1"}}),
            &mut state,
        )
        .unwrap();

    assert_eq!(
        next,
        NextPage::with_params(params(&[
            ("page[size]", "100"),
            ("start_time", "1609459200"),
            ("page[after]", "c1")
        ]))
    );
    assert_eq!(state.cursor.as_deref(), Some("c1"));
}

#[test]
fn test_cursor_paginator_stops() {
    let paginator = CursorPaginator::new(100, Vec::new());
    let mut state = PaginationState::new();

    let next = paginator
        .process_response(&json!({"meta": {"has_more": false}}), &mut state)
        .unwrap();
    assert!(next.is_done());
    assert!(state.done);

    let next = paginator
        .process_response(&json!({"groups": []}), &mut PaginationState::new())
        .unwrap();
    assert!(next.is_done());
}

#[test]
fn test_cursor_paginator_missing_cursor_is_violation() {
    let paginator = CursorPaginator::new(100, Vec::new());
    let err = paginator
        .process_response(&json!({"meta": {"has_more": true}}), &mut PaginationState::new())
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::ProtocolViolation);
}

#[test]
fn test_next_page_paginator() {
    let paginator = NextPagePaginator::new(50, Vec::new());
    assert_eq!(paginator.initial_params(), params(&[("per_page", "50")]));

    let next = paginator
        .process_response(
            &json!({"next_page": "https://x/brands?page=2"}),
            &mut PaginationState::new(),
        )
        .unwrap();
    assert_eq!(next, NextPage::with_url("https://x/brands?page=2"));

    for body in [json!({}), json!({"next_page": null}), json!({"next_page": ""})] {
        let next = paginator
            .process_response(&body, &mut PaginationState::new())
            .unwrap();
        assert!(next.is_done());
    }
}

#[test]
fn test_time_export_honors_end_of_stream() {
    let body = json!({"next_page": "https://x/next", "end_of_stream": true});

    let offset = NextPagePaginator::new(100, Vec::new());
    assert!(offset
        .process_response(&body, &mut PaginationState::new())
        .unwrap()
        .is_continue());

    let export = NextPagePaginator::time_export(100, Vec::new());
    assert!(export
        .process_response(&body, &mut PaginationState::new())
        .unwrap()
        .is_done());
}

#[test]
fn test_export_paginator() {
    let paginator = ExportPaginator::new(1_609_459_200, Some("metric_sets".into()));
    assert_eq!(
        paginator.initial_params(),
        params(&[("start_time", "1609459200"), ("include", "metric_sets")])
    );

    let next = paginator
        .process_response(
            &json!({"after_cursor": "xyz", "end_of_stream": false}),
            &mut PaginationState::new(),
        )
        .unwrap();
    assert_eq!(
        next,
        NextPage::with_params(params(&[("cursor", "xyz"), ("include", "metric_sets")]))
    );

    let next = paginator
        .process_response(&json!({"end_of_stream": true}), &mut PaginationState::new())
        .unwrap();
    assert!(next.is_done());

    let err = paginator
        .process_response(&json!({"end_of_stream": false}), &mut PaginationState::new())
        .unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation { .. }));
}

// ============================================================================
// extract_records Tests
// ============================================================================

#[test]
fn test_extract_records() {
    let page = json!({
        "groups": [{"id": 1}, {"id": 2}],
        "definitions": {"actions": [{"subject": "status"}]},
        "single": {"id": 9},
        "count": 3
    });

    assert_eq!(extract_records(&page, "groups").len(), 2);
    assert_eq!(
        extract_records(&page, "definitions.actions"),
        vec![json!({"subject": "status"})]
    );
    assert_eq!(extract_records(&page, "single"), vec![json!({"id": 9})]);
    assert!(extract_records(&page, "count").is_empty());
    assert!(extract_records(&page, "missing").is_empty());
    assert!(extract_records(&page, "groups.nested").is_empty());
}

// ============================================================================
// Driver Tests
// ============================================================================

#[tokio::test]
async fn test_cursor_pagination_follows_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/groups"))
        .and(query_param("page[size]", "2"))
        .and(query_param_is_missing("page[after]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groups": [{"id": 1}, {"id": 2}],
            "meta": {"has_more": true, "after_cursor": "c1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/groups"))
        .and(query_param("page[after]", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groups": [{"id": 3}],
            "meta": {"has_more": false, "after_cursor": "c2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pages: Vec<_> = paginate(
        client_for(&server),
        "groups",
        Arc::new(CursorPaginator::new(2, Vec::new())),
    )
    .collect()
    .await;

    assert_eq!(pages.len(), 2);
    let ids: Vec<_> = pages
        .iter()
        .flat_map(|p| extract_records(p.as_ref().unwrap(), "groups"))
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_next_page_link_is_used_verbatim() {
    let server = MockServer::start().await;
    let next = format!("{}/brands.json?page=2&per_page=100", server.uri());

    Mock::given(method("GET"))
        .and(path("/brands"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "brands": [{"id": 1}],
            "next_page": next
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/brands.json"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "brands": [{"id": 2}],
            "next_page": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pages: Vec<_> = paginate(
        client_for(&server),
        "brands",
        Arc::new(NextPagePaginator::new(100, Vec::new())),
    )
    .collect()
    .await;

    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_export_pagination_stops_on_end_of_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/incremental/users/cursor.json"))
        .and(query_param("start_time", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"id": 1}],
            "after_cursor": "a",
            "end_of_stream": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/incremental/users/cursor.json"))
        .and(query_param("cursor", "a"))
        .and(query_param_is_missing("start_time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"id": 2}],
            "after_cursor": "b",
            "end_of_stream": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pages: Vec<_> = paginate(
        client_for(&server),
        "incremental/users/cursor.json",
        Arc::new(ExportPaginator::new(100, None)),
    )
    .collect()
    .await;

    assert_eq!(pages.len(), 2);
}

#[tokio::test]
async fn test_page_yielded_before_protocol_violation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/incremental/users/cursor.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"id": 1}],
            "end_of_stream": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pages: Vec<_> = paginate(
        client_for(&server),
        "incremental/users/cursor.json",
        Arc::new(ExportPaginator::new(0, None)),
    )
    .collect()
    .await;

    assert_eq!(pages.len(), 2);
    assert!(pages[0].is_ok());
    assert!(matches!(pages[1], Err(Error::ProtocolViolation { .. })));
}

#[tokio::test]
async fn test_dropping_stream_stops_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tags": [{"name": "a"}],
            "meta": {"has_more": true, "after_cursor": "next"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut pages = paginate(
        client_for(&server),
        "tags",
        Arc::new(CursorPaginator::new(100, Vec::new())),
    );
    let first = pages.next().await.unwrap().unwrap();
    assert_eq!(first["tags"][0]["name"], "a");
    drop(pages);
}

#[tokio::test]
async fn test_transport_error_ends_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/views"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let pages: Vec<_> = paginate(
        client_for(&server),
        "views",
        Arc::new(CursorPaginator::new(100, Vec::new())),
    )
    .collect()
    .await;

    assert_eq!(pages.len(), 1);
    assert_eq!(
        pages[0].as_ref().unwrap_err().class(),
        ErrorClass::ClientError
    );
}
