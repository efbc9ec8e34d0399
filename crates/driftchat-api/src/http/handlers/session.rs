//! Session CRUD HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/v1/sessions               - List sessions
//! - GET    /api/v1/sessions/{id}/messages - Ordered message history
//! - DELETE /api/v1/sessions/{id}          - Delete a session and its messages
//!
//! Session deletion happens only here; the chat protocol never deletes.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use driftchat_types::chat::{ChatMessage, ChatSession};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

/// GET /api/v1/sessions - List all sessions, most recent first.
pub async fn list_sessions(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<ChatSession>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let sessions = state.chat_service.sessions().await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(sessions, request_id, elapsed)))
}

/// GET /api/v1/sessions/{id}/messages - Ordered message history.
pub async fn get_messages(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let sid = parse_uuid(&session_id)?;
    let messages = state.chat_service.history(&sid).await?;
    if messages.is_empty() {
        return Err(AppError::NotFound(format!(
            "No messages for session {sid}"
        )));
    }

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(messages, request_id, elapsed)))
}

/// DELETE /api/v1/sessions/{id} - Delete a session and its messages.
pub async fn delete_session(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let sid = parse_uuid(&session_id)?;
    if !state.chat_service.delete_session(&sid).await? {
        return Err(AppError::NotFound(format!("Session {sid} not found")));
    }

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        json!({ "deleted": sid }),
        request_id,
        elapsed,
    )))
}
