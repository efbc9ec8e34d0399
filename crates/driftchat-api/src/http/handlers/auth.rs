//! Authentication HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/auth/login  - Exchange email/password for a bearer token
//! - GET  /api/v1/auth/verify - Resolve the caller's bearer token

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use driftchat_core::auth::CredentialStore;
use driftchat_types::identity::Identity;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Plaintext bearer token; shown exactly once.
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
}

/// POST /api/v1/auth/login - Verify credentials and issue a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let identity = state.credentials.authenticate(&body.email, &body.password).await?;
    let token = state.credentials.issue(&identity.user_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        LoginResponse {
            token,
            user_id: identity.user_id,
            email: identity.email,
        },
        request_id,
        elapsed,
    )))
}

/// GET /api/v1/auth/verify - Echo the identity bound to the caller's token.
pub async fn verify(
    Authenticated(identity): Authenticated,
) -> Json<ApiResponse<Identity>> {
    Json(ApiResponse::success(
        identity,
        Uuid::now_v7().to_string(),
        0,
    ))
}
