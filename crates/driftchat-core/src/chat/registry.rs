//! Live-connection registry.
//!
//! One explicitly owned instance is shared by all connection tasks (never
//! ambient global state). The map is a [`DashMap`], so mutation is guarded
//! by a per-shard lock scoped to the single insert/remove/lookup -- never
//! held across I/O. Delivery is best-effort with no acks: a send is just a
//! push onto the connection's unbounded event channel.
//!
//! The registry never touches durable storage.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use driftchat_types::event::ServerEvent;

struct ConnectionEntry {
    user_id: Option<Uuid>,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

/// Tracks live connections by session id and supports targeted delivery
/// plus per-user fan-out.
#[derive(Default)]
pub struct SessionRegistry {
    connections: DashMap<Uuid, ConnectionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection's event sender under `session_id`.
    ///
    /// On collision the prior entry is silently replaced -- last writer
    /// wins, matching the fire-and-forget nature of transport bookkeeping.
    pub fn register(
        &self,
        session_id: Uuid,
        user_id: Option<Uuid>,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) {
        self.connections
            .insert(session_id, ConnectionEntry { user_id, sender });
    }

    /// Remove a session's connection. Idempotent: removing a session not
    /// present is a no-op.
    pub fn unregister(&self, session_id: &Uuid) {
        self.connections.remove(session_id);
    }

    /// Deliver one event to the live connection for `session_id`, if present.
    /// Returns whether delivery was attempted on a live channel.
    pub fn send_to(&self, session_id: &Uuid, event: ServerEvent) -> bool {
        match self.connections.get(session_id) {
            Some(entry) => entry.sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver `event` to every session currently bound to `user_id`.
    ///
    /// Iteration order is unspecified. A session whose channel is already
    /// closed is skipped, not retried, and does not abort delivery to the
    /// remaining sessions.
    pub fn broadcast_to_user(&self, user_id: &Uuid, event: &ServerEvent) {
        for entry in self.connections.iter() {
            if entry.user_id == Some(*user_id) {
                let _ = entry.sender.send(event.clone());
            }
        }
    }

    /// Whether a live connection is bound under `session_id`.
    pub fn is_registered(&self, session_id: &Uuid) -> bool {
        self.connections.contains_key(session_id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
