use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

/// Basic email format validation.
///
/// Intentionally permissive: one @, non-empty local part, dotted domain.
/// Not RFC 5322, just a sanity check before the UNIQUE constraint sees it.
pub fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    let (local, domain) = (parts[0], parts[1]);

    if local.is_empty() || local.contains(' ') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    if domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}

/// A marketplace user. Anyone can host events (chef) or join them (foodie);
/// the Stripe fields are only populated once the user connects an account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2id hash, never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    /// Stripe connected-account id (acct_xxx), set when onboarding starts.
    pub stripe_account_id: Option<String>,
    /// Mirrors the gateway's `details_submitted`; refreshed by webhook or poll.
    pub stripe_onboarding_complete: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateUser {
    pub fn validate(&self) -> Result<()> {
        validate_email_format(&self.email)?;
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
        }
        if self.password.len() < 8 {
            return Err(AppError::BadRequest(msg::PASSWORD_TOO_SHORT.into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub university: Option<String>,
    pub description: Option<String>,
    pub profile_picture: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        assert!(validate_email_format("chef@example.com").is_ok());
        assert!(validate_email_format("a.b+c@sub.domain.org").is_ok());
    }

    #[test]
    fn rejects_malformed_emails() {
        for bad in ["", "no-at-sign", "two@@ats.com", "@nodomain.com", "x@", "x@nodot", "x@.dot.com", "a b@x.com"] {
            assert!(validate_email_format(bad).is_err(), "should reject {:?}", bad);
        }
    }
}
