//! SQLite persistence.
//!
//! - [`pool`]: split reader/writer connection pool with WAL mode.
//! - [`chat`]: `ChatRepository` implementation over `chat_sessions` and
//!   `chat_messages`.

pub mod chat;
pub mod pool;
