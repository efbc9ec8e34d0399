//! SQLite-backed credential store.
//!
//! Passwords are hashed with Argon2id. Bearer tokens are opaque
//! (`drift_<64 hex>` from the OS RNG); only their SHA-256 hash is stored,
//! so a database leak never exposes a usable token.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use driftchat_core::auth::CredentialStore;
use driftchat_types::error::AuthError;
use driftchat_types::identity::{Identity, User};

use crate::sqlite::pool::DatabasePool;

/// Credential store over the `users` and `auth_tokens` tables.
pub struct SqliteCredentialStore {
    pool: DatabasePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Register a new user with an Argon2id-hashed password.
    pub async fn create_user(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::StorageError(e.to_string()))?
            .to_string();

        let user = User {
            id: Uuid::now_v7(),
            email: email.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO users (id, email, password_hash, is_active, created_at)
               VALUES (?, ?, ?, 1, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| AuthError::StorageError(e.to_string()))?;

        Ok(user)
    }

    /// Verify an email/password pair against the stored Argon2 hash.
    ///
    /// A missing user and a wrong password report the same error, so the
    /// response does not reveal which emails are registered.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, is_active FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| AuthError::StorageError(e.to_string()))?
        .ok_or(AuthError::InvalidCredentials)?;

        let stored: String = row
            .try_get("password_hash")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        let parsed =
            PasswordHash::new(&stored).map_err(|e| AuthError::StorageError(e.to_string()))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Err(AuthError::InvalidCredentials);
        }

        let is_active: i64 = row
            .try_get("is_active")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        if is_active == 0 {
            return Err(AuthError::AccountDisabled);
        }

        let id: String = row
            .try_get("id")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        let user_id =
            Uuid::parse_str(&id).map_err(|e| AuthError::StorageError(e.to_string()))?;

        Ok(Identity {
            user_id,
            email: email.to_string(),
        })
    }
}

impl CredentialStore for SqliteCredentialStore {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let token_hash = hash_token(token);

        let row = sqlx::query(
            r#"SELECT t.id AS token_id, u.id AS user_id, u.email, u.is_active
               FROM auth_tokens t JOIN users u ON u.id = t.user_id
               WHERE t.token_hash = ?"#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| AuthError::StorageError(e.to_string()))?
        .ok_or(AuthError::InvalidToken)?;

        let is_active: i64 = row
            .try_get("is_active")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        if is_active == 0 {
            return Err(AuthError::AccountDisabled);
        }

        // Update last_used_at (best effort, don't fail the request)
        let token_id: String = row
            .try_get("token_id")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        let _ = sqlx::query("UPDATE auth_tokens SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(&token_id)
            .execute(&self.pool.writer)
            .await;

        let id: String = row
            .try_get("user_id")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        let email: String = row
            .try_get("email")
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        let user_id =
            Uuid::parse_str(&id).map_err(|e| AuthError::StorageError(e.to_string()))?;

        Ok(Identity { user_id, email })
    }

    async fn issue(&self, user_id: &Uuid) -> Result<String, AuthError> {
        let mut token_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut token_bytes);
        let token = format!(
            "drift_{}",
            token_bytes
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>()
        );

        sqlx::query(
            "INSERT INTO auth_tokens (id, user_id, token_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(user_id.to_string())
        .bind(hash_token(&token))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| AuthError::StorageError(e.to_string()))?;

        Ok(token)
    }
}

/// Compute the SHA-256 hash of a bearer token (lowercase hex).
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)
}
