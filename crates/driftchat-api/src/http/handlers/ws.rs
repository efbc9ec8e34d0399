//! WebSocket chat endpoint.
//!
//! `GET /ws/chat` upgrades the connection and hands it to a
//! [`SessionConnection`]. Authentication is optional: a bearer token (header
//! or `?token=` query parameter) binds the session to a user, no token
//! yields an anonymous session, but a token that fails verification rejects
//! the upgrade.
//!
//! The socket is split into two halves:
//! - a writer task drains the connection's event channel and serializes each
//!   event as one JSON text frame;
//! - this task reads inbound frames and feeds them to the state machine one
//!   at a time, so completion cycles stay strictly sequential.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use driftchat_core::auth::CredentialStore;
use driftchat_core::chat::connection::{ConnectionConfig, SessionConnection};

use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Bearer token for clients that cannot set headers during the
    /// WebSocket handshake (browsers).
    pub token: Option<String>,
    /// Resume an existing session instead of generating a fresh id.
    pub session_id: Option<Uuid>,
}

/// GET /ws/chat - Upgrade to a chat WebSocket.
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
) -> Result<Response, AppError> {
    let token = header_token(&headers).or(query.token);

    let user_id = match token {
        Some(token) => Some(state.credentials.verify(&token).await?.user_id),
        None => None,
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, query.session_id)))
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    user_id: Option<Uuid>,
    requested_session: Option<Uuid>,
) {
    let config = ConnectionConfig {
        stream_token_timeout: Duration::from_secs(state.config.stream_token_timeout_secs),
        complete_timeout: Duration::from_secs(state.config.complete_timeout_secs),
    };

    let (mut conn, events) = SessionConnection::open(
        state.chat_service.clone(),
        state.provider.clone(),
        state.registry.clone(),
        requested_session,
        user_id,
        config,
    );
    tracing::debug!(session_id = %conn.session_id(), "Chat WebSocket connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer task: serialize each event as one text frame. Dropping the
    // receiver on exit makes the state machine's emits fail, which cancels
    // any in-flight completion wait.
    let writer = tokio::spawn(async move {
        let mut events = UnboundedReceiverStream::new(events);
        while let Some(event) = events.next().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        // Client disconnected
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!("Failed to serialize server event: {err}");
                }
            }
        }
    });

    // Read loop: one frame at a time. handle_frame runs the whole
    // completion cycle, so the next frame is not read until it finishes.
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => conn.handle_frame(&text).await,
            Ok(Message::Close(_)) => break,
            Err(err) => {
                tracing::debug!("WebSocket receive error: {err}");
                break;
            }
            // Ignore binary, ping, pong protocol frames (handled by axum/tungstenite)
            Ok(_) => {}
        }
    }

    let session_id = conn.session_id();
    conn.close();
    drop(conn);
    let _ = writer.await;
    tracing::debug!(%session_id, "Chat WebSocket closed");
}
