//! End-to-end tests for the HTTP session state machine, driven through the
//! dispatcher without a live socket.

use bytes::Bytes;
use canvas_mcp::server::dispatcher::SESSION_ID_HEADER;
use canvas_mcp::session::run_sweep;
use canvas_mcp::{CanvasClient, McpDispatcher, McpService, SessionRegistry};
use http_body_util::{BodyExt, Full};
use hyper::http::{Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn dispatcher() -> Arc<McpDispatcher> {
    Arc::new(McpDispatcher::new(
        Arc::new(SessionRegistry::new()),
        Arc::new(CanvasClient::new()),
    ))
}

fn post(body: &str, session: Option<&str>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json");
    if let Some(id) = session {
        builder = builder.header(SESSION_ID_HEADER, id);
    }
    builder
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn request(method: &str, session: Option<&str>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri("/mcp");
    if let Some(id) = session {
        builder = builder.header(SESSION_ID_HEADER, id);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

async fn body_json(response: Response<impl http_body::Body<Data = Bytes>>) -> Value {
    let bytes = match response.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => unreachable!("response bodies are infallible"),
    };
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response<impl http_body::Body<Data = Bytes>>) -> String {
    let bytes = match response.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => unreachable!("response bodies are infallible"),
    };
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn initialize_body() -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test", "version": "0"}
        }
    })
    .to_string()
}

async fn handshake(dispatcher: &McpDispatcher) -> String {
    let response = dispatcher.handle(post(&initialize_body(), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get(SESSION_ID_HEADER)
        .expect("handshake must return a session id")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn handshake_creates_session_and_returns_id() {
    let dispatcher = dispatcher();
    let response = dispatcher.handle(post(&initialize_body(), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let id = response
        .headers()
        .get(SESSION_ID_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["serverInfo"]["name"], "canvas-mcp");

    assert!(dispatcher.registry().get(&id).await.is_some());
}

#[tokio::test]
async fn concurrent_handshakes_get_distinct_sessions() {
    let dispatcher = dispatcher();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move { handshake(&dispatcher).await }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(dispatcher.registry().len().await, 8);
}

#[tokio::test]
async fn post_without_session_and_not_initialize_is_rejected() {
    let dispatcher = dispatcher();
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string();
    let response = dispatcher.handle(post(&body, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(
        body["error"]["message"],
        "Bad Request: No valid session ID provided"
    );
    assert_eq!(body["id"], Value::Null);
    assert!(dispatcher.registry().is_empty().await);
}

#[tokio::test]
async fn post_with_unknown_session_is_rejected_as_text() {
    let dispatcher = dispatcher();
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string();
    let response = dispatcher
        .handle(post(&body, Some("11111111-2222-3333-4444-555555555555")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Invalid or missing session ID");
}

#[tokio::test]
async fn malformed_json_is_a_parse_error_not_a_server_failure() {
    let dispatcher = dispatcher();
    let response = dispatcher.handle(post("{not json", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn session_lifecycle_handshake_list_delete() {
    let dispatcher = dispatcher();
    let id = handshake(&dispatcher).await;

    let list = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}).to_string();
    let response = dispatcher.handle(post(&list, Some(&id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 7);

    let response = dispatcher.handle(request("DELETE", Some(&id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(dispatcher.registry().get(&id).await.is_none());

    // The id is dead from here on: polling and retries see "unknown session".
    let response = dispatcher.handle(request("GET", Some(&id))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = dispatcher.handle(post(&list, Some(&id))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn double_delete_is_not_a_server_error() {
    let dispatcher = dispatcher();
    let id = handshake(&dispatcher).await;
    let first = dispatcher.handle(request("DELETE", Some(&id))).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = dispatcher.handle(request("DELETE", Some(&id))).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notification_returns_accepted_without_body() {
    let dispatcher = dispatcher();
    let id = handshake(&dispatcher).await;
    let note = json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string();
    let response = dispatcher.handle(post(&note, Some(&id))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn get_with_known_session_opens_event_stream() {
    let dispatcher = dispatcher();
    let id = handshake(&dispatcher).await;
    let response = dispatcher.handle(request("GET", Some(&id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}

#[tokio::test]
async fn get_without_session_is_rejected() {
    let dispatcher = dispatcher();
    let response = dispatcher.handle(request("GET", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Invalid or missing session ID");

    // A never-issued id is a client error, not a server failure.
    let response = dispatcher
        .handle(request("GET", Some("aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_traffic_defers_eviction() {
    let dispatcher = dispatcher();
    let ttl = Duration::from_secs(3600);
    let id = handshake(&dispatcher).await;

    // Back-date the session to the brink of expiry, then serve one request.
    let Some(past) = Instant::now().checked_sub(ttl - Duration::from_secs(1)) else {
        return;
    };
    assert!(dispatcher.registry().touch_at(&id, past).await);
    let ping = json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}).to_string();
    let response = dispatcher.handle(post(&ping, Some(&id))).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The request refreshed last-activity, so the sweep finds nothing.
    let swept = dispatcher
        .registry()
        .sweep_expired(Instant::now(), ttl)
        .await;
    assert!(swept.is_empty());
    assert!(dispatcher.registry().get(&id).await.is_some());
}

#[tokio::test]
async fn tower_service_drives_the_dispatcher() {
    use tower_service::Service;

    let mut service = McpService::new(dispatcher());
    let response = match service.call(post(&initialize_body(), None)).await {
        Ok(response) => response,
        Err(infallible) => match infallible {},
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(SESSION_ID_HEADER));
}

#[tokio::test]
async fn client_delete_racing_a_sweep_closes_once() {
    let dispatcher = dispatcher();
    let ttl = Duration::from_secs(60);
    let id = handshake(&dispatcher).await;
    let transport = dispatcher.registry().get(&id).await.unwrap();

    // Expire the session, then let a client DELETE and a sweep pass contend
    // for its teardown.
    let Some(past) = Instant::now().checked_sub(ttl + Duration::from_secs(1)) else {
        return;
    };
    assert!(dispatcher.registry().touch_at(&id, past).await);

    let registry = dispatcher.registry().clone();
    let sweep = tokio::spawn(async move { run_sweep(&registry, ttl).await });
    let delete = dispatcher.handle(request("DELETE", Some(&id))).await;
    sweep.await.unwrap();

    // Exactly one side tore the session down; the loser saw a no-op. The
    // DELETE reports 200 when it won the removal and 400 when the sweep did.
    assert!(transport.is_closed());
    assert!(dispatcher.registry().get(&id).await.is_none());
    assert!(
        delete.status() == StatusCode::OK || delete.status() == StatusCode::BAD_REQUEST,
        "unexpected status {}",
        delete.status()
    );
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let dispatcher = dispatcher();
    let response = dispatcher
        .handle(
            Request::builder()
                .method("POST")
                .uri("/other")
                .body(Full::new(Bytes::from("{}")))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
