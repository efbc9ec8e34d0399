use thiserror::Error;

/// Malformed inbound protocol frames.
///
/// Recovered locally: surfaced to the client as an `error` event, never
/// terminates the session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Errors from completion-source operations.
///
/// Produced by the blocking `complete` call once the upstream has exhausted
/// all strategies; streaming failures arrive as data instead.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("malformed upstream output: {0}")]
    Malformed(String),

    #[error("completion timed out")]
    Timeout,
}

/// Errors from repository operations (used by trait definitions in driftchat-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors from credential-store operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user account is disabled")]
    AccountDisabled,

    #[error("storage error: {0}")]
    StorageError(String),
}
