//! Completion-source abstractions for Driftchat.
//!
//! Defines the `CompletionProvider` trait implemented by the
//! infrastructure layer (e.g., the Groq adapter).

pub mod provider;
