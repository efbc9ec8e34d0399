//! Shared domain types for Driftchat.
//!
//! This crate contains the core domain types used across the Driftchat
//! backend: chat sessions and messages, the WebSocket protocol frames,
//! completion-source types, identities, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod llm;
