//! Chat service orchestrating session lifecycle and message persistence.
//!
//! ChatService sits between the state machine and the `ChatRepository`:
//! it creates sessions implicitly on first write, stamps messages, and
//! keeps the session's `updated_at` current.

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use driftchat_types::chat::{ChatMessage, ChatSession};
use driftchat_types::error::RepositoryError;

use crate::chat::repository::ChatRepository;

/// Orchestrates chat session lifecycle and message persistence.
///
/// Generic over `ChatRepository` so driftchat-core never depends on
/// driftchat-infra.
pub struct ChatService<C: ChatRepository> {
    repo: C,
}

impl<C: ChatRepository> ChatService<C> {
    /// Create a new chat service with the given repository.
    pub fn new(repo: C) -> Self {
        Self { repo }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &C {
        &self.repo
    }

    /// Persist a user-authored message, creating the session implicitly if
    /// this is its first message. The first message also names the session
    /// for listings.
    ///
    /// The write must succeed before any acknowledgment is sent; a failure
    /// here aborts the whole cycle upstream.
    pub async fn save_user_message(
        &self,
        session_id: Uuid,
        user_id: Option<Uuid>,
        content: String,
    ) -> Result<ChatMessage, RepositoryError> {
        self.ensure_session(session_id, user_id, &content).await?;

        let message = ChatMessage::from_user(session_id, user_id, content);
        self.repo.add_message(&message).await?;
        self.touch(&session_id).await;
        Ok(message)
    }

    /// Persist an assistant reply. Only called with non-empty content; a
    /// failed completion cycle never stores an assistant turn.
    pub async fn save_assistant_message(
        &self,
        session_id: Uuid,
        content: String,
    ) -> Result<ChatMessage, RepositoryError> {
        let message = ChatMessage::from_assistant(session_id, content);
        self.repo.add_message(&message).await?;
        self.touch(&session_id).await;
        Ok(message)
    }

    /// Ordered message history for a session.
    pub async fn history(&self, session_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.repo.messages_by_session(session_id).await
    }

    /// All sessions, most recent first.
    pub async fn sessions(&self) -> Result<Vec<ChatSession>, RepositoryError> {
        self.repo.list_sessions().await
    }

    /// Delete a session and its messages. Returns whether it existed.
    pub async fn delete_session(&self, session_id: &Uuid) -> Result<bool, RepositoryError> {
        self.repo.delete_session(session_id).await
    }

    async fn ensure_session(
        &self,
        session_id: Uuid,
        user_id: Option<Uuid>,
        first_message: &str,
    ) -> Result<(), RepositoryError> {
        if self.repo.get_session(&session_id).await?.is_none() {
            let mut session = ChatSession::new(session_id, user_id);
            session.title = Some(ChatSession::title_from(first_message));
            self.repo.create_session(&session).await?;
        }
        Ok(())
    }

    // The message itself is already durable at this point, so a failed
    // timestamp bump must not fail the cycle.
    async fn touch(&self, session_id: &Uuid) {
        if let Err(err) = self.repo.touch_session(session_id, Utc::now()).await {
            warn!(%session_id, error = %err, "Failed to bump session updated_at");
        }
    }
}
