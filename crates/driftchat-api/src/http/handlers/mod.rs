//! HTTP and WebSocket request handlers.

pub mod auth;
pub mod session;
pub mod ws;
