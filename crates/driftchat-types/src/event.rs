//! WebSocket protocol frames.
//!
//! One event per frame, JSON-object payloads. Inbound frames have a single
//! shape; outbound events are tagged by a `type` field.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound frame (client -> server).
///
/// `message` is required; a frame that does not decode to this shape is a
/// protocol error. `session_id` optionally overrides the connection's bound
/// session, letting a single connection drive multiple sessions.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Outbound event (server -> client), tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once, immediately after the handshake. The carried session id
    /// is the correlation key for every subsequent message.
    ConnectionEstablished { session_id: Uuid },

    /// The inbound user message has been durably stored.
    MessageReceived { session_id: Uuid },

    /// One incremental fragment of the streamed completion. A fallback
    /// full-text reply uses the same framing as many small tokens.
    Token { content: String, session_id: Uuid },

    /// The assistant reply has been durably stored.
    Completion { session_id: Uuid },

    /// Generation or persistence failed, or the inbound frame was malformed.
    Error { message: String, session_id: Uuid },
}

impl ServerEvent {
    /// The session this event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            ServerEvent::ConnectionEstablished { session_id }
            | ServerEvent::MessageReceived { session_id }
            | ServerEvent::Token { session_id, .. }
            | ServerEvent::Completion { session_id }
            | ServerEvent::Error { session_id, .. } => *session_id,
        }
    }
}
