//! Business logic and repository trait definitions for Driftchat.
//!
//! This crate defines the "ports" (repository and credential-store traits)
//! that the infrastructure layer implements, plus the two pieces with real
//! protocol shape: the Session Registry and the chat session state machine.
//! It depends only on `driftchat-types` -- never on `driftchat-infra` or
//! any database/HTTP crate.

pub mod auth;
pub mod chat;
pub mod llm;
