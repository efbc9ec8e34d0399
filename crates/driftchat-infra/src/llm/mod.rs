//! Completion provider implementations.
//!
//! Groq exposes an OpenAI-compatible API, so the adapter is built on
//! [`async_openai`] with a Groq base URL.

pub mod groq;
