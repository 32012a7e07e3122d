//! HTTP route handlers for the MoodChat API.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::store::{generate_conversation_id, StoreError};

use super::state::AppState;
use super::ws::ws_handler;

/// Accepted MIME types for context-file uploads.
const ALLOWED_UPLOAD_TYPES: [&str; 3] = ["text/plain", "text/markdown", "application/json"];

/// Multipart bodies above the upload cap must still reach the handler so
/// it can answer 400 instead of axum's generic 413.
const MULTIPART_BODY_LIMIT: usize = 8 * 1024 * 1024;

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            get(get_conversation)
                .put(update_conversation)
                .delete(delete_conversation),
        )
        .route("/api/conversations/{id}/files", post(upload_context_file))
        .route("/ws/{id}", get(ws_handler))
        .layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT))
        .with_state(state)
}

/// Health check endpoint with storage counters.
async fn health_check(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.store.stats().await.map_err(store_error)?;
    Ok(Json(json!({
        "status": "ok",
        "service": "moodchat",
        "version": env!("CARGO_PKG_VERSION"),
        "conversations": stats.conversations,
        "messages": stats.messages,
        "themes": stats.themes,
        "db_size_bytes": stats.db_size_bytes,
    })))
}

/// Conversation creation request.
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    /// Display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Initial custom context, prepended to the system prompt.
    #[serde(default)]
    pub custom_context: Option<String>,
}

/// Conversation update request; absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateConversationRequest {
    /// New display title.
    #[serde(default)]
    pub title: Option<String>,
    /// New custom context, replacing the old one entirely.
    #[serde(default)]
    pub custom_context: Option<String>,
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = state.store.list().await.map_err(store_error)?;
    Ok(Json(json!({ "conversations": conversations })))
}

async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = generate_conversation_id();
    let title = request.title.unwrap_or_else(|| "New Conversation".to_string());
    let custom_context = request.custom_context.unwrap_or_default();
    let conversation = state
        .store
        .create(&id, &title, &custom_context)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({
        "conversation_id": conversation.id.clone(),
        "conversation": conversation,
    })))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state.store.get(&id).await.map_err(store_error)?;
    Ok(Json(json!({ "conversation": conversation })))
}

async fn update_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state
        .store
        .update(&id, request.title, request.custom_context)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "conversation": conversation })))
}

async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let existed = state.store.delete(&id).await.map_err(store_error)?;
    if !existed {
        return Err(not_found());
    }
    Ok(Json(json!({ "message": "Conversation deleted" })))
}

/// Accept a small text file and append it to the conversation's custom
/// context as a `[File: name]` block.
async fn upload_context_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state.store.get(&id).await.map_err(store_error)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| bad_request("Invalid multipart body"))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.txt").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| bad_request("Could not read uploaded file"))?;

        validate_upload(&content_type, bytes.len(), state.config.max_upload_bytes)
            .map_err(bad_request)?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| bad_request("File must be valid UTF-8"))?;

        let appended = format!(
            "{}\n\n[File: {filename}]\n{text}",
            conversation.custom_context
        );
        state
            .store
            .update(&id, None, Some(appended))
            .await
            .map_err(store_error)?;
        return Ok(Json(json!({
            "message": "File uploaded successfully",
            "filename": filename,
        })));
    }

    Err(bad_request("No file field in request"))
}

/// Check an upload's declared type and size against the configured cap.
fn validate_upload(content_type: &str, size: usize, max_bytes: usize) -> Result<(), &'static str> {
    if !ALLOWED_UPLOAD_TYPES.contains(&content_type) {
        return Err("Only .txt, .md, and .json files are supported");
    }
    if size > max_bytes {
        return Err("File too large (max 1MB)");
    }
    Ok(())
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => not_found(),
        StoreError::DuplicateKey(key) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": format!("Conversation {key} already exists") })),
        ),
        other => {
            tracing::error!("storage failure: {other}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
        }
    }
}

fn not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Conversation not found" })),
    )
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_upload_accepts_allowed_types() {
        for ty in ALLOWED_UPLOAD_TYPES {
            assert!(validate_upload(ty, 512, 1_000_000).is_ok());
        }
    }

    #[test]
    fn test_validate_upload_rejects_wrong_type() {
        assert!(validate_upload("application/pdf", 512, 1_000_000).is_err());
        assert!(validate_upload("", 512, 1_000_000).is_err());
    }

    #[test]
    fn test_validate_upload_rejects_oversize() {
        // 2MB file against the 1MB cap
        assert!(validate_upload("text/plain", 2_000_000, 1_000_000).is_err());
        // Exactly at the cap is fine
        assert!(validate_upload("text/plain", 1_000_000, 1_000_000).is_ok());
    }
}
