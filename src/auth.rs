//! Bearer-token auth and password hashing.
//!
//! Access tokens are HS256 JWTs carrying the user id as the subject.
//! Passwords are hashed with Argon2id using the crate defaults.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use jwt_simple::prelude::*;
use sha2::{Digest, Sha256};

use crate::db::AppState;
use crate::error::{AppError, Result};

/// Access token lifetime in hours.
const TOKEN_TTL_HOURS: u64 = 24 * 7;

/// Holds the JWT signing key. Cheap to clone, shared via `AppState`.
#[derive(Clone)]
pub struct TokenKeys {
    key: Arc<HS256Key>,
}

impl TokenKeys {
    /// HS256 rejects keys under 96 bits, so the configured secret is
    /// stretched through SHA-256 into a fixed 32-byte key first.
    pub fn from_secret(secret: &str) -> Self {
        let key_bytes = Sha256::digest(secret.as_bytes());
        Self {
            key: Arc::new(HS256Key::from_bytes(&key_bytes)),
        }
    }

    /// Issue a bearer token for a user id.
    pub fn issue(&self, user_id: &str) -> Result<String> {
        let claims = Claims::create(Duration::from_hours(TOKEN_TTL_HOURS))
            .with_subject(user_id)
            .with_issuer("supperclub");
        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify a bearer token and return the user id it was issued for.
    pub fn verify(&self, token: &str) -> Result<String> {
        let mut options = VerificationOptions::default();
        options.allowed_issuers = Some(std::collections::HashSet::from(["supperclub".to_string()]));
        let claims = self
            .key
            .verify_token::<NoCustomClaims>(token, Some(options))
            .map_err(|_| AppError::Unauthorized)?;
        claims.subject.ok_or(AppError::Unauthorized)
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Extractor yielding the authenticated user's id from the bearer token.
/// Rejects with 401 when the header is missing or the token is invalid.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;
        let user_id = state.tokens.verify(token)?;
        Ok(AuthUser(user_id))
    }
}
