//! Credential-store abstraction.
//!
//! The backend treats identity as an external collaborator behind a narrow
//! interface: verify a bearer token, issue a new one. The SQLite-backed
//! implementation lives in driftchat-infra.

use uuid::Uuid;

use driftchat_types::error::AuthError;
use driftchat_types::identity::Identity;

/// Verifies bearer tokens and issues new ones.
pub trait CredentialStore: Send + Sync {
    /// Resolve a bearer token to the identity it was issued for.
    fn verify(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, AuthError>> + Send;

    /// Issue a new bearer token for `user_id`. The plaintext token is
    /// returned exactly once; only a hash is retained.
    fn issue(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<String, AuthError>> + Send;
}
