//! ChatRepository trait definition.
//!
//! Provides persistence operations for chat sessions and messages.
//! Implementations live in driftchat-infra (e.g., `SqliteChatRepository`).
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use driftchat_types::chat::{ChatMessage, ChatSession};
use driftchat_types::error::RepositoryError;

/// Repository trait for chat session and message persistence.
///
/// Each operation is one atomic write; the protocol layer never holds a
/// store transaction open across a network wait.
pub trait ChatRepository: Send + Sync {
    /// Create a new chat session. Creating a session that already exists
    /// is a no-op (sessions are created implicitly and concurrently).
    fn create_session(
        &self,
        session: &ChatSession,
    ) -> impl std::future::Future<Output = Result<ChatSession, RepositoryError>> + Send;

    /// Get a chat session by its unique ID.
    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatSession>, RepositoryError>> + Send;

    /// Bump a session's `updated_at` timestamp.
    fn touch_session(
        &self,
        session_id: &Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List all sessions, most recently created first.
    fn list_sessions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    /// Delete a session and its messages. Returns whether a session existed.
    fn delete_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Persist a new message.
    fn add_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Get messages for a session, ordered by created_at ASC with the
    /// time-sortable id as tie-break.
    fn messages_by_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;
}
