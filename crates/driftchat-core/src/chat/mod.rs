//! Chat session orchestration for Driftchat.
//!
//! - [`repository`]: the `ChatRepository` trait the infrastructure layer
//!   implements for session and message persistence.
//! - [`service`]: `ChatService`, the persistence orchestration layer.
//! - [`registry`]: the live-connection registry.
//! - [`connection`]: the per-connection chat session state machine.

pub mod connection;
pub mod registry;
pub mod repository;
pub mod service;
