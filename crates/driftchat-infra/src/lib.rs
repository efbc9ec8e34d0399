//! Infrastructure layer for Driftchat.
//!
//! Contains implementations of the traits defined in `driftchat-core`:
//! SQLite storage, the bearer-token credential store, the Groq completion
//! provider, and configuration loading.

pub mod auth;
pub mod config;
pub mod llm;
pub mod sqlite;
