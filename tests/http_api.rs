//! End-to-end tests for the HTTP API over an in-memory store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use moodchat::config::MoodchatConfig;
use moodchat::server::{create_router, AppState};
use moodchat::store::{ConversationStore, MemoryConversationStore};

fn test_app() -> (Router, Arc<MemoryConversationStore>) {
    let store = Arc::new(MemoryConversationStore::new());
    let state = AppState::with_store(MoodchatConfig::default(), store.clone())
        .expect("state should assemble");
    (create_router(state), store)
}

async fn body_json(body: Body) -> Value {
    let bytes = to_bytes(body, usize::MAX).await.expect("body should read");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

fn multipart_request(uri: &str, filename: &str, content_type: &str, content: &[u8]) -> Request<Body> {
    let boundary = "moodchat-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request should build")
}

#[tokio::test]
async fn test_health_reports_storage_counters() {
    let (app, store) = test_app();
    store.create("c1", "Test", "").await.unwrap();

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["conversations"], 1);
}

#[tokio::test]
async fn test_create_then_get_conversation() {
    let (app, _store) = test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/conversations",
            json!({"title": "Trip planning", "custom_context": "Be brief."}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    let id = body["conversation_id"].as_str().unwrap().to_string();
    assert_eq!(body["conversation"]["title"], "Trip planning");

    let response = app
        .oneshot(
            Request::get(format!("/api/conversations/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["conversation"]["custom_context"], "Be brief.");
    assert_eq!(body["conversation"]["user_message_count"], 0);
}

#[tokio::test]
async fn test_create_defaults_title() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(json_request("POST", "/api/conversations", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["conversation"]["title"], "New Conversation");
}

#[tokio::test]
async fn test_unknown_conversation_is_404() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(
            Request::get("/api/conversations/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"], "Conversation not found");
}

#[tokio::test]
async fn test_update_changes_only_provided_fields() {
    let (app, store) = test_app();
    store.create("c1", "Old title", "Old context").await.unwrap();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/conversations/c1",
            json!({"title": "New title"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["conversation"]["title"], "New title");
    assert_eq!(body["conversation"]["custom_context"], "Old context");
}

#[tokio::test]
async fn test_delete_conversation() {
    let (app, store) = test_app();
    store.create("c1", "Test", "").await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::delete("/api/conversations/c1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.get("c1").await.is_err());

    // Second delete reports the row gone.
    let response = app
        .oneshot(
            Request::delete("/api/conversations/c1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_appends_file_block_to_context() {
    let (app, store) = test_app();
    store.create("c1", "Test", "Existing context").await.unwrap();

    let response = app
        .oneshot(multipart_request(
            "/api/conversations/c1/files",
            "notes.md",
            "text/markdown",
            b"# Notes\nremember the milk",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["filename"], "notes.md");

    let conversation = store.get("c1").await.unwrap();
    assert_eq!(
        conversation.custom_context,
        "Existing context\n\n[File: notes.md]\n# Notes\nremember the milk"
    );
}

#[tokio::test]
async fn test_upload_rejects_disallowed_type() {
    let (app, store) = test_app();
    store.create("c1", "Test", "").await.unwrap();

    let response = app
        .oneshot(multipart_request(
            "/api/conversations/c1/files",
            "evil.bin",
            "application/octet-stream",
            b"\x00\x01",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // Context untouched on rejection.
    assert_eq!(store.get("c1").await.unwrap().custom_context, "");
}

#[tokio::test]
async fn test_upload_rejects_oversize_file() {
    let (app, store) = test_app();
    store.create("c1", "Test", "").await.unwrap();

    let oversize = vec![b'a'; 2 * 1024 * 1024];
    let response = app
        .oneshot(multipart_request(
            "/api/conversations/c1/files",
            "big.txt",
            "text/plain",
            &oversize,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.get("c1").await.unwrap().custom_context, "");
}

#[tokio::test]
async fn test_upload_to_unknown_conversation_is_404() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(multipart_request(
            "/api/conversations/nope/files",
            "notes.txt",
            "text/plain",
            b"hello",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
