//! Chat session and message types for Driftchat.
//!
//! Sessions group messages into one conversation thread; messages carry an
//! origin flag (`is_user`) distinguishing human input from assistant replies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat session: one logical conversation thread.
///
/// Created implicitly on first connection or message, updated on every
/// message. A session may outlive any single connection; deletion happens
/// only through the administrative REST endpoint, never via the protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    /// Owning user, when the connection was authenticated.
    pub user_id: Option<Uuid>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Build a fresh session owned by `user_id`, stamped with the current time.
    pub fn new(id: Uuid, user_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            title: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derive a display title from the session's first message: its first
    /// non-empty line, truncated to 50 characters.
    pub fn title_from(content: &str) -> String {
        let line = content.trim().lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return "New chat".to_string();
        }
        if line.chars().count() <= 50 {
            return line.to_string();
        }
        let mut title: String = line.chars().take(50).collect();
        title.push_str("...");
        title
    }
}

/// A single message within a chat session.
///
/// Messages are ordered by `created_at` within a session, with the
/// time-sortable UUIDv7 `id` breaking ties (timestamp resolution may
/// coincide for adjacent writes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Option<Uuid>,
    /// true = authored by the human, false = assistant reply.
    pub is_user: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a user-authored message for `session_id`.
    pub fn from_user(session_id: Uuid, user_id: Option<Uuid>, content: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id,
            user_id,
            is_user: true,
            content,
            created_at: Utc::now(),
        }
    }

    /// Build an assistant reply for `session_id`.
    pub fn from_assistant(session_id: Uuid, content: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id,
            user_id: None,
            is_user: false,
            content,
            created_at: Utc::now(),
        }
    }
}
