//! Per-connection chat session state machine.
//!
//! One [`SessionConnection`] drives one live transport:
//! `Connecting -> Open -> (AwaitingCompletion <-> Open) -> Closed`.
//! The transport layer feeds it raw inbound frames strictly sequentially
//! (a new frame is not read until the previous completion cycle finished)
//! and forwards the events it emits back to the client.
//!
//! The cycle for one well-formed frame:
//! 1. persist the user message (the human half of the exchange must be
//!    durable even if generation fails entirely), ack `message_received`;
//! 2. consume the provider's lazy chunk stream, forwarding each delta as a
//!    `token` event with no buffering beyond one chunk;
//! 3. on stream failure (failure chunk, abnormal end, or stall past the
//!    timeout) retry once as a blocking completion, emitted as a single
//!    `token` event with identical framing;
//! 4. persist the accumulated reply and emit `completion`, or emit `error`
//!    when the accumulator is empty -- a failed completion never
//!    terminates the session.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use driftchat_types::error::{GenerationError, ProtocolError};
use driftchat_types::event::{ClientFrame, ServerEvent};
use driftchat_types::llm::StreamChunk;

use crate::chat::registry::SessionRegistry;
use crate::chat::repository::ChatRepository;
use crate::chat::service::ChatService;
use crate::llm::provider::CompletionProvider;

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    AwaitingCompletion,
    /// Terminal; no further events are processed once entered.
    Closed,
}

/// Timeouts for one connection's completion cycles.
///
/// The upstream contract mandates no timeout, but without one a stalled
/// provider leaks the connection task. A stall past the timeout is treated
/// identically to a stream failure.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum wait for the next streamed chunk.
    pub stream_token_timeout: Duration,
    /// Maximum wait for the blocking fallback call.
    pub complete_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            stream_token_timeout: Duration::from_secs(30),
            complete_timeout: Duration::from_secs(60),
        }
    }
}

/// State machine for one live chat connection.
pub struct SessionConnection<C: ChatRepository, P: CompletionProvider> {
    session_id: Uuid,
    user_id: Option<Uuid>,
    state: ConnectionState,
    chat: Arc<ChatService<C>>,
    provider: Arc<P>,
    registry: Arc<SessionRegistry>,
    events: mpsc::UnboundedSender<ServerEvent>,
    cancel: CancellationToken,
    config: ConnectionConfig,
}

impl<C: ChatRepository, P: CompletionProvider> SessionConnection<C, P> {
    /// Complete the handshake for a new connection.
    ///
    /// Generates a session id unless the caller supplied one, registers the
    /// connection, and emits `connection_established` carrying the id that
    /// correlates every subsequent message. Returns the receiving half of
    /// the event channel for the transport to drain.
    pub fn open(
        chat: Arc<ChatService<C>>,
        provider: Arc<P>,
        registry: Arc<SessionRegistry>,
        requested_session: Option<Uuid>,
        user_id: Option<Uuid>,
        config: ConnectionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let session_id = requested_session.unwrap_or_else(Uuid::now_v7);
        let (tx, rx) = mpsc::unbounded_channel();

        registry.register(session_id, user_id, tx.clone());

        let mut conn = Self {
            session_id,
            user_id,
            state: ConnectionState::Connecting,
            chat,
            provider,
            registry,
            events: tx,
            cancel: CancellationToken::new(),
            config,
        };
        conn.emit(ServerEvent::ConnectionEstablished { session_id });
        conn.state = ConnectionState::Open;
        (conn, rx)
    }

    /// The session id bound at handshake.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Token cancelled when the transport dies; the transport layer holds a
    /// clone and cancels it on disconnect so in-flight completion waits
    /// stop promptly.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process one raw inbound frame through a full completion cycle.
    ///
    /// The caller must await this before reading the next frame; that is
    /// what makes cycles strictly sequential within a session.
    pub async fn handle_frame(&mut self, raw: &str) {
        if self.state == ConnectionState::Closed {
            return;
        }

        let frame = match serde_json::from_str::<ClientFrame>(raw) {
            Ok(frame) => frame,
            Err(err) => {
                let err = ProtocolError::InvalidFrame(err.to_string());
                warn!(session_id = %self.session_id, %err, "Rejecting malformed frame");
                self.emit(ServerEvent::Error {
                    message: err.to_string(),
                    session_id: self.session_id,
                });
                return;
            }
        };

        // Per-frame session override for multi-session clients.
        let session_id = frame.session_id.unwrap_or(self.session_id);
        self.state = ConnectionState::AwaitingCompletion;

        // Data integrity over responsiveness: no generation is attempted
        // unless the user message is durable.
        if let Err(err) = self
            .chat
            .save_user_message(session_id, self.user_id, frame.message.clone())
            .await
        {
            error!(%session_id, %err, "Failed to store user message, aborting cycle");
            self.emit(ServerEvent::Error {
                message: "Failed to store message".to_string(),
                session_id,
            });
            self.state = ConnectionState::Open;
            return;
        }
        self.emit(ServerEvent::MessageReceived { session_id });

        match self.generate(&frame.message, session_id).await {
            Some(reply) => match self.chat.save_assistant_message(session_id, reply).await {
                Ok(_) => self.emit(ServerEvent::Completion { session_id }),
                Err(err) => {
                    // The client saw the tokens but history would not have
                    // them; do not claim completion for content that failed
                    // to persist.
                    error!(%session_id, %err, "Failed to store assistant reply");
                    self.emit(ServerEvent::Error {
                        message: "Failed to store response".to_string(),
                        session_id,
                    });
                }
            },
            None => {
                if !self.cancel.is_cancelled() {
                    self.emit(ServerEvent::Error {
                        message: "Failed to generate response".to_string(),
                        session_id,
                    });
                }
            }
        }

        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Open;
        }
    }

    /// Run one generation attempt: stream first, blocking fallback second.
    ///
    /// Returns the accumulated reply, or `None` when the cycle failed (or
    /// was cancelled by a disconnect).
    async fn generate(&self, prompt: &str, session_id: Uuid) -> Option<String> {
        let mut reply = String::new();
        let mut stream_failed = false;

        {
            let mut stream = pin!(self.provider.stream(prompt));
            loop {
                let next = tokio::select! {
                    _ = self.cancel.cancelled() => return None,
                    next = timeout(self.config.stream_token_timeout, stream.next()) => next,
                };
                match next {
                    Err(_) => {
                        warn!(%session_id, "Token stream stalled past timeout");
                        stream_failed = true;
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(StreamChunk::Delta(text))) => {
                        reply.push_str(&text);
                        self.emit(ServerEvent::Token {
                            content: text,
                            session_id,
                        });
                    }
                    Ok(Some(StreamChunk::Failed(reason))) => {
                        warn!(%session_id, %reason, "Token stream failed, falling back");
                        stream_failed = true;
                        break;
                    }
                }
            }
        }

        if stream_failed {
            // One blocking attempt survives a streaming hiccup. Any partial
            // accumulation from the broken stream is discarded in favor of
            // the fallback's complete text.
            let fallback = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                result = timeout(self.config.complete_timeout, self.provider.complete(prompt)) => {
                    result.unwrap_or(Err(GenerationError::Timeout))
                }
            };
            match fallback {
                Ok(text) if !text.is_empty() => {
                    // Identical client-visible framing to streamed tokens.
                    self.emit(ServerEvent::Token {
                        content: text.clone(),
                        session_id,
                    });
                    reply = text;
                }
                Ok(_) => return None,
                Err(err) => {
                    warn!(%session_id, %err, "Fallback completion failed");
                    return None;
                }
            }
        }

        if reply.is_empty() { None } else { Some(reply) }
    }

    /// Terminal transition: cancel any in-flight completion wait and drop
    /// the registry binding. Safe to call from multiple detection paths;
    /// unregistration happens once because the state flips first.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.cancel.cancel();
        self.registry.unregister(&self.session_id);
        debug!(session_id = %self.session_id, "Connection closed");
    }

    fn emit(&self, event: ServerEvent) {
        if self.events.send(event).is_err() {
            // Receiver gone means the transport writer died; stop any
            // in-flight wait so the task can unwind.
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};
    use futures_util::stream;

    use driftchat_types::chat::{ChatMessage, ChatSession};
    use driftchat_types::error::{GenerationError, RepositoryError};

    // ------------------------------------------------------------------
    // In-memory collaborators
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryRepository {
        sessions: Mutex<HashMap<Uuid, ChatSession>>,
        messages: Mutex<Vec<ChatMessage>>,
        fail_user_writes: AtomicBool,
        fail_assistant_writes: AtomicBool,
    }

    impl ChatRepository for MemoryRepository {
        async fn create_session(
            &self,
            session: &ChatSession,
        ) -> Result<ChatSession, RepositoryError> {
            self.sessions
                .lock()
                .unwrap()
                .entry(session.id)
                .or_insert_with(|| session.clone());
            Ok(session.clone())
        }

        async fn get_session(
            &self,
            session_id: &Uuid,
        ) -> Result<Option<ChatSession>, RepositoryError> {
            Ok(self.sessions.lock().unwrap().get(session_id).cloned())
        }

        async fn touch_session(
            &self,
            session_id: &Uuid,
            at: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id) {
                session.updated_at = at;
            }
            Ok(())
        }

        async fn list_sessions(&self) -> Result<Vec<ChatSession>, RepositoryError> {
            Ok(self.sessions.lock().unwrap().values().cloned().collect())
        }

        async fn delete_session(&self, session_id: &Uuid) -> Result<bool, RepositoryError> {
            let existed = self.sessions.lock().unwrap().remove(session_id).is_some();
            self.messages
                .lock()
                .unwrap()
                .retain(|m| m.session_id != *session_id);
            Ok(existed)
        }

        async fn add_message(
            &self,
            message: &ChatMessage,
        ) -> Result<ChatMessage, RepositoryError> {
            let fail = if message.is_user {
                self.fail_user_writes.load(Ordering::SeqCst)
            } else {
                self.fail_assistant_writes.load(Ordering::SeqCst)
            };
            if fail {
                return Err(RepositoryError::Query("disk full".to_string()));
            }
            self.messages.lock().unwrap().push(message.clone());
            Ok(message.clone())
        }

        async fn messages_by_session(
            &self,
            session_id: &Uuid,
        ) -> Result<Vec<ChatMessage>, RepositoryError> {
            let mut messages: Vec<ChatMessage> = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.session_id == *session_id)
                .cloned()
                .collect();
            messages.sort_by_key(|m| (m.created_at, m.id));
            Ok(messages)
        }
    }

    /// Provider with a scripted chunk sequence and fallback result.
    struct ScriptedProvider {
        chunks: Vec<StreamChunk>,
        /// `None` makes the blocking call fail.
        fallback: Option<String>,
        /// When set, `stream` never yields (exercises the stall timeout).
        stall: bool,
        /// When set, `complete` never resolves either.
        stall_complete: bool,
        stream_calls: AtomicUsize,
        complete_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(chunks: Vec<StreamChunk>, fallback: Option<String>) -> Self {
            Self {
                chunks,
                fallback,
                stall: false,
                stall_complete: false,
                stream_calls: AtomicUsize::new(0),
                complete_calls: AtomicUsize::new(0),
            }
        }

        fn stalled(fallback: Option<String>) -> Self {
            Self {
                chunks: Vec::new(),
                fallback,
                stall: true,
                stall_complete: false,
                stream_calls: AtomicUsize::new(0),
                complete_calls: AtomicUsize::new(0),
            }
        }

        fn unresponsive() -> Self {
            Self {
                chunks: Vec::new(),
                fallback: Some("never delivered".to_string()),
                stall: true,
                stall_complete: true,
                stream_calls: AtomicUsize::new(0),
                complete_calls: AtomicUsize::new(0),
            }
        }
    }

    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn stream(
            &self,
            _prompt: &str,
        ) -> std::pin::Pin<Box<dyn futures_util::Stream<Item = StreamChunk> + Send + 'static>>
        {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                Box::pin(stream::pending())
            } else {
                Box::pin(stream::iter(self.chunks.clone()))
            }
        }

        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.complete_calls.fetch_add(1, Ordering::SeqCst);
            if self.stall_complete {
                std::future::pending::<()>().await;
            }
            match &self.fallback {
                Some(text) => Ok(text.clone()),
                None => Err(GenerationError::Upstream("unreachable".to_string())),
            }
        }
    }

    struct Harness {
        repo: Arc<ChatService<Arc<MemoryRepository>>>,
        raw_repo: Arc<MemoryRepository>,
        provider: Arc<ScriptedProvider>,
        registry: Arc<SessionRegistry>,
    }

    impl ChatRepository for Arc<MemoryRepository> {
        async fn create_session(
            &self,
            session: &ChatSession,
        ) -> Result<ChatSession, RepositoryError> {
            self.as_ref().create_session(session).await
        }

        async fn get_session(
            &self,
            session_id: &Uuid,
        ) -> Result<Option<ChatSession>, RepositoryError> {
            self.as_ref().get_session(session_id).await
        }

        async fn touch_session(
            &self,
            session_id: &Uuid,
            at: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            self.as_ref().touch_session(session_id, at).await
        }

        async fn list_sessions(&self) -> Result<Vec<ChatSession>, RepositoryError> {
            self.as_ref().list_sessions().await
        }

        async fn delete_session(&self, session_id: &Uuid) -> Result<bool, RepositoryError> {
            self.as_ref().delete_session(session_id).await
        }

        async fn add_message(
            &self,
            message: &ChatMessage,
        ) -> Result<ChatMessage, RepositoryError> {
            self.as_ref().add_message(message).await
        }

        async fn messages_by_session(
            &self,
            session_id: &Uuid,
        ) -> Result<Vec<ChatMessage>, RepositoryError> {
            self.as_ref().messages_by_session(session_id).await
        }
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        let raw_repo = Arc::new(MemoryRepository::default());
        Harness {
            repo: Arc::new(ChatService::new(raw_repo.clone())),
            raw_repo,
            provider: Arc::new(provider),
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    fn fast_config() -> ConnectionConfig {
        ConnectionConfig {
            stream_token_timeout: Duration::from_millis(50),
            complete_timeout: Duration::from_millis(50),
        }
    }

    fn open(
        h: &Harness,
    ) -> (
        SessionConnection<Arc<MemoryRepository>, ScriptedProvider>,
        mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        SessionConnection::open(
            h.repo.clone(),
            h.provider.clone(),
            h.registry.clone(),
            None,
            None,
            fast_config(),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_handshake_emits_connection_established_and_registers() {
        let h = harness(ScriptedProvider::new(vec![], None));
        let (conn, mut rx) = open(&h);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![ServerEvent::ConnectionEstablished {
                session_id: conn.session_id()
            }]
        );
        assert!(h.registry.is_registered(&conn.session_id()));
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_happy_path_streams_tokens_and_persists_both_turns() {
        let h = harness(ScriptedProvider::new(
            vec![
                StreamChunk::Delta("Hel".to_string()),
                StreamChunk::Delta("lo!".to_string()),
            ],
            None,
        ));
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"hi"}"#).await;

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                ServerEvent::MessageReceived { session_id: sid },
                ServerEvent::Token {
                    content: "Hel".to_string(),
                    session_id: sid
                },
                ServerEvent::Token {
                    content: "lo!".to_string(),
                    session_id: sid
                },
                ServerEvent::Completion { session_id: sid },
            ]
        );

        let messages = h.repo.history(&sid).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user);
        assert_eq!(messages[0].content, "hi");
        assert!(!messages[1].is_user);
        assert_eq!(messages[1].content, "Hello!");
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_stream_failure_falls_back_to_blocking_completion() {
        let h = harness(ScriptedProvider::new(
            vec![StreamChunk::Failed("boom".to_string())],
            Some("fallback text".to_string()),
        ));
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"hi"}"#).await;

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                ServerEvent::MessageReceived { session_id: sid },
                ServerEvent::Token {
                    content: "fallback text".to_string(),
                    session_id: sid
                },
                ServerEvent::Completion { session_id: sid },
            ]
        );

        let messages = h.repo.history(&sid).await.unwrap();
        assert_eq!(messages[1].content, "fallback text");
        assert_eq!(h.provider.complete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_total_generation_failure_emits_error_keeps_user_message() {
        let h = harness(ScriptedProvider::new(
            vec![StreamChunk::Failed("boom".to_string())],
            None,
        ));
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"hi"}"#).await;

        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, ServerEvent::Token { .. })));
        assert_eq!(
            events.last(),
            Some(&ServerEvent::Error {
                message: "Failed to generate response".to_string(),
                session_id: sid
            })
        );

        let messages = h.repo.history(&sid).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_user);
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_empty_stream_is_a_failed_cycle() {
        let h = harness(ScriptedProvider::new(vec![], None));
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"hi"}"#).await;

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                ServerEvent::MessageReceived { session_id: sid },
                ServerEvent::Error {
                    message: "Failed to generate response".to_string(),
                    session_id: sid
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_is_recoverable() {
        let h = harness(ScriptedProvider::new(
            vec![StreamChunk::Delta("ok".to_string())],
            None,
        ));
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"foo":"bar"}"#).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::Error { .. }));
        assert_eq!(conn.state(), ConnectionState::Open);
        assert!(h.repo.history(&sid).await.unwrap().is_empty());

        // The session stays alive and accepts the next valid frame.
        conn.handle_frame(r#"{"message":"still here"}"#).await;
        let events = drain(&mut rx);
        assert!(events.contains(&ServerEvent::Completion { session_id: sid }));
    }

    #[tokio::test]
    async fn test_user_store_failure_aborts_cycle_before_generation() {
        let h = harness(ScriptedProvider::new(
            vec![StreamChunk::Delta("never".to_string())],
            None,
        ));
        h.raw_repo.fail_user_writes.store(true, Ordering::SeqCst);
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"hi"}"#).await;

        let events = drain(&mut rx);
        // No message_received unless the write succeeded.
        assert!(!events
            .iter()
            .any(|e| matches!(e, ServerEvent::MessageReceived { .. })));
        assert_eq!(
            events,
            vec![ServerEvent::Error {
                message: "Failed to store message".to_string(),
                session_id: sid
            }]
        );
        assert_eq!(h.provider.stream_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_assistant_store_failure_reports_error_not_completion() {
        let h = harness(ScriptedProvider::new(
            vec![StreamChunk::Delta("reply".to_string())],
            None,
        ));
        h.raw_repo
            .fail_assistant_writes
            .store(true, Ordering::SeqCst);
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"hi"}"#).await;

        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, ServerEvent::Completion { .. })));
        assert_eq!(
            events.last(),
            Some(&ServerEvent::Error {
                message: "Failed to store response".to_string(),
                session_id: sid
            })
        );
    }

    #[tokio::test]
    async fn test_per_frame_session_override() {
        let h = harness(ScriptedProvider::new(
            vec![StreamChunk::Delta("ok".to_string())],
            None,
        ));
        let (mut conn, mut rx) = open(&h);
        drain(&mut rx);

        let other = Uuid::now_v7();
        let raw = format!(r#"{{"message":"hi","session_id":"{other}"}}"#);
        conn.handle_frame(&raw).await;

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .all(|e| e.session_id() == other));
        assert_eq!(h.repo.history(&other).await.unwrap().len(), 2);
        assert!(h.repo.history(&conn.session_id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cycles_are_strictly_ordered() {
        let h = harness(ScriptedProvider::new(
            vec![StreamChunk::Delta("r".to_string())],
            None,
        ));
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"one"}"#).await;
        conn.handle_frame(r#"{"message":"two"}"#).await;

        let events = drain(&mut rx);
        let completion_idx = events
            .iter()
            .position(|e| *e == ServerEvent::Completion { session_id: sid })
            .unwrap();
        let second_received_idx = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, ServerEvent::MessageReceived { .. }))
            .map(|(i, _)| i)
            .nth(1)
            .unwrap();
        // Cycle N's completion precedes cycle N+1's acknowledgment.
        assert!(completion_idx < second_received_idx);
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out_into_fallback() {
        let h = harness(ScriptedProvider::stalled(Some("recovered".to_string())));
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"hi"}"#).await;

        let events = drain(&mut rx);
        assert!(events.contains(&ServerEvent::Token {
            content: "recovered".to_string(),
            session_id: sid
        }));
        assert!(events.contains(&ServerEvent::Completion { session_id: sid }));
    }

    #[tokio::test]
    async fn test_stalled_fallback_times_out_as_failed_cycle() {
        let h = harness(ScriptedProvider::unresponsive());
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"hi"}"#).await;

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                ServerEvent::MessageReceived { session_id: sid },
                ServerEvent::Error {
                    message: "Failed to generate response".to_string(),
                    session_id: sid
                },
            ]
        );
        assert_eq!(h.provider.complete_calls.load(Ordering::SeqCst), 1);
        // The user message stays durable even though both attempts hung.
        let messages = h.repo.history(&sid).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_user);
    }

    #[tokio::test]
    async fn test_first_message_titles_session() {
        let h = harness(ScriptedProvider::new(
            vec![StreamChunk::Delta("ok".to_string())],
            None,
        ));
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.handle_frame(r#"{"message":"Explain borrow checking"}"#).await;
        conn.handle_frame(r#"{"message":"And lifetimes?"}"#).await;

        let session = h.raw_repo.get_session(&sid).await.unwrap().unwrap();
        // Only the first message names the session.
        assert_eq!(session.title.as_deref(), Some("Explain borrow checking"));
    }

    #[tokio::test]
    async fn test_close_unregisters_and_ignores_further_frames() {
        let h = harness(ScriptedProvider::new(
            vec![StreamChunk::Delta("ok".to_string())],
            None,
        ));
        let (mut conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        conn.close();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!h.registry.is_registered(&sid));
        assert!(conn.cancellation_token().is_cancelled());

        conn.handle_frame(r#"{"message":"late"}"#).await;
        assert!(drain(&mut rx).is_empty());
        assert!(h.repo.history(&sid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_inflight_completion() {
        let h = harness(ScriptedProvider::stalled(Some("never sent".to_string())));
        let (conn, mut rx) = open(&h);
        let sid = conn.session_id();
        drain(&mut rx);

        let cancel = conn.cancellation_token();
        let mut conn = conn;
        let handle = tokio::spawn(async move {
            conn.handle_frame(r#"{"message":"hi"}"#).await;
            conn
        });

        // Let the cycle reach the stream wait, then drop the transport.
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let conn = handle.await.unwrap();

        let events = drain(&mut rx);
        // The user message was acknowledged, but no tokens or completion
        // may arrive after the disconnect.
        assert_eq!(events, vec![ServerEvent::MessageReceived { session_id: sid }]);
        assert_eq!(conn.state(), ConnectionState::Open);
    }
}
