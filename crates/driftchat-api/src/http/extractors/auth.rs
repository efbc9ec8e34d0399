//! Bearer-token authentication extractor.
//!
//! Extracts the token from `Authorization: Bearer <token>` and resolves it
//! through the credential store. Extracting [`Authenticated`] from a
//! handler's arguments is what makes that route require auth.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use driftchat_core::auth::CredentialStore;
use driftchat_types::identity::Identity;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated request marker carrying the verified identity.
pub struct Authenticated(pub Identity);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Validation(
            "Missing bearer token. Provide via 'Authorization: Bearer <token>' header."
                .to_string(),
        ))?;

        let identity = state.credentials.verify(&token).await?;
        Ok(Authenticated(identity))
    }
}

/// Pull the token out of the `Authorization: Bearer` header, if present.
pub fn bearer_token(parts: &Parts) -> Option<String> {
    let auth = parts.headers.get("authorization")?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = value {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = parts_with_auth(Some("Bearer drift_abc123"));
        assert_eq!(bearer_token(&parts).as_deref(), Some("drift_abc123"));
    }

    #[test]
    fn test_missing_header_yields_none() {
        let parts = parts_with_auth(None);
        assert!(bearer_token(&parts).is_none());
    }

    #[test]
    fn test_non_bearer_scheme_yields_none() {
        let parts = parts_with_auth(Some("Basic dXNlcjpwdw=="));
        assert!(bearer_token(&parts).is_none());
    }
}
