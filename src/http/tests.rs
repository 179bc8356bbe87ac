//! Tests for the HTTP client and shape transport

use super::*;
use crate::cursor::CursorPhase;
use crate::engine::{SyncEngine, SyncEvent};
use crate::error::Error;
use crate::state::StateManager;
use crate::transport::Transport;
use crate::types::BackoffType;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(2)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .build();
    HttpClient::with_config(config).unwrap()
}

fn chunk(offset: &str, handle: &str, body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header(OFFSET_HEADER, offset)
        .insert_header(HANDLE_HEADER, handle)
        .set_body_json(body)
}

// ============================================================================
// HttpClient Tests
// ============================================================================

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_retries, 3);
    assert!(config.base_url.is_none());
    assert!(config.user_agent.starts_with("shape-sync/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("http://localhost:3000")
        .timeout(Duration::from_secs(90))
        .max_retries(5)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(10),
        )
        .header("X-Custom", "value")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.base_url.as_deref(), Some("http://localhost:3000"));
    assert_eq!(config.timeout, Duration::from_secs(90));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(
        config.default_headers.get("X-Custom"),
        Some(&"value".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_calculate_backoff() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_millis(500),
        )
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(400));
    assert_eq!(client.calculate_backoff(3), Duration::from_millis(500));
}

#[tokio::test]
async fn test_http_client_retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client.get("/v1/shape", &[]).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_http_client_does_not_retry_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad table"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get("/v1/shape", &[]).await.unwrap_err();
    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad table");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_http_client_default_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(header("X-Source", "test"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .header("X-Source", "test")
        .build();
    let client = HttpClient::with_config(config).unwrap();
    let response = client.get("/v1/shape", &[]).await.unwrap();
    assert_eq!(response.status(), 200);
}

// ============================================================================
// HttpTransport Tests
// ============================================================================

#[test]
fn test_shape_request_builder() {
    let request = ShapeRequest::new("users")
        .with_where("active = true")
        .with_columns(vec!["id".to_string(), "name".to_string()])
        .live(true);

    assert_eq!(request.table, "users");
    assert_eq!(request.where_clause.as_deref(), Some("active = true"));
    assert_eq!(request.columns.len(), 2);
    assert!(request.live);
}

#[tokio::test]
async fn test_transport_tracks_offset_and_handle() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("table", "users"))
        .and(query_param("offset", "-1"))
        .and(query_param("where", "id > 1"))
        .and(query_param("columns", "id,name"))
        .and(query_param_is_missing("handle"))
        .respond_with(chunk(
            "0_0",
            "h-1",
            json!([{"key": "1", "value": {"id": "1"}, "headers": {"operation": "insert"}}]),
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("offset", "0_0"))
        .and(query_param("handle", "h-1"))
        .respond_with(chunk(
            "12_3",
            "h-1",
            json!([{"headers": {"control": "up-to-date"}}]),
        ))
        .mount(&server)
        .await;

    let request = ShapeRequest::new("users")
        .with_where("id > 1")
        .with_columns(vec!["id".to_string(), "name".to_string()]);
    let mut transport = HttpTransport::new(client_for(&server), "/v1/shape", request);

    let first = transport.next_batch().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(transport.request_offset(), "0_0");
    assert_eq!(transport.handle(), Some("h-1"));

    let second = transport.next_batch().await.unwrap().unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(transport.request_offset(), "12_3");

    // One-shot sync ends after catching up
    assert!(transport.next_batch().await.unwrap().is_none());
    assert!(!transport.is_live());
}

#[tokio::test]
async fn test_transport_switches_to_live() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param_is_missing("live"))
        .respond_with(chunk(
            "5_0",
            "h-1",
            json!([{"headers": {"control": "up-to-date"}}]),
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("live", "true"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header(OFFSET_HEADER, "5_0")
                .insert_header(HANDLE_HEADER, "h-1"),
        )
        .mount(&server)
        .await;

    let request = ShapeRequest::new("users").live(true);
    let mut transport = HttpTransport::new(client_for(&server), "/v1/shape", request);

    transport.next_batch().await.unwrap().unwrap();
    assert!(transport.is_live());

    let idle = transport.next_batch().await.unwrap().unwrap();
    assert!(idle.is_empty());
}

#[tokio::test]
async fn test_transport_conflict_becomes_must_refetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param_is_missing("handle"))
        .respond_with(chunk("40_0", "stale", json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("handle", "stale"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let mut transport =
        HttpTransport::new(client_for(&server), "/v1/shape", ShapeRequest::new("users"));
    transport.next_batch().await.unwrap().unwrap();
    assert_eq!(transport.handle(), Some("stale"));

    let batch = transport.next_batch().await.unwrap().unwrap();
    assert_eq!(batch, vec![json!({"headers": {"control": "must-refetch"}})]);
    assert_eq!(transport.request_offset(), "-1");
    assert!(transport.handle().is_none());
}

#[tokio::test]
async fn test_transport_restart_from_offset_keeps_handle() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .respond_with(chunk("7_0", "h-9", json!([])))
        .mount(&server)
        .await;

    let mut transport =
        HttpTransport::new(client_for(&server), "/v1/shape", ShapeRequest::new("users"));
    transport.next_batch().await.unwrap();

    transport.restart(Some("5_2".parse().unwrap())).await.unwrap();
    assert_eq!(transport.request_offset(), "5_2");
    assert_eq!(transport.handle(), Some("h-9"));

    transport.restart(None).await.unwrap();
    assert_eq!(transport.request_offset(), "-1");
    assert!(transport.handle().is_none());
}

#[tokio::test]
async fn test_transport_rejects_non_array_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .respond_with(chunk("0_0", "h", json!({"not": "an array"})))
        .mount(&server)
        .await;

    let mut transport =
        HttpTransport::new(client_for(&server), "/v1/shape", ShapeRequest::new("users"));
    let err = transport.next_batch().await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

#[tokio::test]
async fn test_transport_requires_offset_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut transport =
        HttpTransport::new(client_for(&server), "/v1/shape", ShapeRequest::new("users"));
    let err = transport.next_batch().await.unwrap_err();
    assert!(err.to_string().contains(OFFSET_HEADER));
}

#[tokio::test]
async fn test_engine_over_http_resyncs_after_conflict() {
    let server = MockServer::start().await;

    // First session: one row, then the shape is rotated
    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("offset", "-1"))
        .respond_with(chunk(
            "1_0",
            "old",
            json!([{"key": "a", "value": {"id": "a"}, "headers": {"operation": "insert"}}]),
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("handle", "old"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    // Second session from scratch
    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("offset", "-1"))
        .respond_with(chunk(
            "3_0",
            "new",
            json!([
                {"key": "b", "value": {"id": "b"}, "headers": {"operation": "insert"}},
                {"headers": {"control": "up-to-date", "global_last_seen_lsn": "3"}}
            ]),
        ))
        .mount(&server)
        .await;

    let transport =
        HttpTransport::new(client_for(&server), "/v1/shape", ShapeRequest::new("items"));
    let mut engine = SyncEngine::new(transport);

    let events: Vec<SyncEvent> = engine
        .events()
        .map(|item| item.unwrap())
        .collect()
        .await;

    let kinds: Vec<&str> = events
        .iter()
        .map(|event| match event {
            SyncEvent::RowChange { change, .. } => change.key.as_str(),
            SyncEvent::UpToDate { .. } => "up-to-date",
            SyncEvent::MustResync => "must-resync",
            SyncEvent::Control { .. } => "control",
        })
        .collect();
    assert_eq!(kinds, vec!["a", "must-resync", "b", "up-to-date"]);
    assert_eq!(
        engine.cursor().offset().map(|o| o.to_string()),
        Some("3_0".to_string())
    );
    assert_eq!(engine.transport().handle(), Some("new"));
}

// ============================================================================
// Checkpoint Resume Tests
// ============================================================================

/// Refuses any non-initial offset that arrives without its shape handle
async fn mount_handle_check(server: &MockServer, offset: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("offset", offset))
        .and(query_param_is_missing("handle"))
        .respond_with(ResponseTemplate::new(400).set_body_string("handle required"))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_transport_restart_without_handle_starts_over() {
    let server = MockServer::start().await;
    let mut transport =
        HttpTransport::new(client_for(&server), "/v1/shape", ShapeRequest::new("users"));

    transport.restart(Some("5_2".parse().unwrap())).await.unwrap();
    assert_eq!(transport.request_offset(), "-1");

    let resumed = transport
        .resume("5_2".parse().unwrap(), Some("h-3".to_string()))
        .await
        .unwrap();
    assert!(resumed);
    assert_eq!(transport.request_offset(), "5_2");
    assert_eq!(transport.handle(), Some("h-3"));
}

#[tokio::test]
async fn test_engine_resumes_checkpoint_in_new_process() {
    let server = MockServer::start().await;
    mount_handle_check(&server, "42_0").await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("offset", "42_0"))
        .and(query_param("handle", "h-7"))
        .respond_with(chunk(
            "50_0",
            "h-7",
            json!([
                {"key": "c", "value": {"id": "c"}, "headers": {"operation": "update"}},
                {"headers": {"control": "up-to-date", "global_last_seen_lsn": "50"}}
            ]),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("checkpoint.json");
    StateManager::from_file(&file)
        .unwrap()
        .set_position("users", "42_0".parse().unwrap(), Some("h-7".to_string()))
        .await
        .unwrap();

    // Fresh transport and store, as after a process restart
    let state = StateManager::from_file(&file).unwrap();
    let transport =
        HttpTransport::new(client_for(&server), "/v1/shape", ShapeRequest::new("users"));
    let mut engine = SyncEngine::new(transport).with_checkpoint(state.clone(), "users");

    assert_eq!(engine.resume().await.unwrap(), "42_0".parse().ok());

    let events: Vec<SyncEvent> = engine
        .events()
        .map(|item| item.unwrap())
        .collect()
        .await;
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        SyncEvent::RowChange { change, offset } if change.key == "c" && *offset == "42_0".parse().ok()
    ));
    assert_eq!(events[1], SyncEvent::up_to_date("50_0".parse().ok()));

    let saved = state.checkpoint("users").await.unwrap();
    assert_eq!(saved.offset, "50_0".parse().ok());
    assert_eq!(saved.handle.as_deref(), Some("h-7"));
}

#[tokio::test]
async fn test_engine_checkpoint_without_handle_starts_over() {
    let server = MockServer::start().await;
    mount_handle_check(&server, "42_0").await;

    Mock::given(method("GET"))
        .and(path("/v1/shape"))
        .and(query_param("offset", "-1"))
        .and(query_param_is_missing("handle"))
        .respond_with(chunk(
            "60_0",
            "h-8",
            json!([
                {"key": "d", "value": {"id": "d"}, "headers": {"operation": "insert"}},
                {"headers": {"control": "up-to-date", "global_last_seen_lsn": "60"}}
            ]),
        ))
        .expect(1)
        .mount(&server)
        .await;

    // Checkpoint written before handles were stored
    let state = StateManager::in_memory();
    state
        .set_position("users", "42_0".parse().unwrap(), None)
        .await
        .unwrap();

    let transport =
        HttpTransport::new(client_for(&server), "/v1/shape", ShapeRequest::new("users"));
    let mut engine = SyncEngine::new(transport).with_checkpoint(state.clone(), "users");

    assert!(engine.resume().await.unwrap().is_none());
    assert_eq!(engine.cursor().phase(), CursorPhase::Initializing);

    let events: Vec<SyncEvent> = engine
        .events()
        .map(|item| item.unwrap())
        .collect()
        .await;
    assert!(matches!(&events[0], SyncEvent::RowChange { offset: None, .. }));
    assert_eq!(events[1], SyncEvent::up_to_date("60_0".parse().ok()));

    let saved = state.checkpoint("users").await.unwrap();
    assert_eq!(saved.offset, "60_0".parse().ok());
    assert_eq!(saved.handle.as_deref(), Some("h-8"));
}
