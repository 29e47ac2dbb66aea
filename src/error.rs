use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The payment provider rejected the request (caller-side problem).
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// The payment provider is unreachable or failed on its side.
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// User-facing message constants, shared between handlers and tests.
pub mod msg {
    pub const USER_NOT_FOUND: &str = "User not found";
    pub const MEAL_NOT_FOUND: &str = "Meal not found";
    pub const EVENT_NOT_FOUND: &str = "Event not found";
    pub const CHEF_NOT_FOUND: &str = "Chef not found";
    pub const EMAIL_TAKEN: &str = "Email already registered";
    pub const EMAIL_EMPTY: &str = "Email cannot be empty";
    pub const INVALID_EMAIL_FORMAT: &str = "Invalid email format";
    pub const NAME_EMPTY: &str = "Name cannot be empty";
    pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters";
    pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

    pub const HOST_CANNOT_JOIN: &str = "Host cannot join their own event";
    pub const EVENT_IN_PAST: &str = "Cannot join a past event";
    pub const ALREADY_JOINED: &str = "Already joined this event";
    pub const EVENT_FULL: &str = "Event is full";
    pub const CHEF_PAYMENT_NOT_CONFIGURED: &str = "Chef payment not configured";
    pub const CHEF_PAYMENT_NOT_READY: &str = "Chef payment account not ready";

    pub const NOT_REGISTERED: &str = "Not registered for this event";
    pub const PAYMENT_NOT_FOUND: &str = "Payment not found";
    pub const ALREADY_REFUNDED: &str = "Already refunded";
    pub const REFUND_WINDOW_EXPIRED: &str = "Refund window has expired";
    pub const TOO_CLOSE_TO_EVENT: &str = "Too close to event time";

    pub const NOT_EVENT_HOST: &str = "Only the event host can perform this action";
    pub const NO_PENDING_PARTICIPATION: &str = "No pending participation for this user";
    pub const STRIPE_NOT_CONNECTED: &str = "Stripe Connect account not configured";

    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
}

/// Convenience for turning `Ok(None)` lookups into 404s.
pub trait OptionExt<T> {
    fn or_not_found(self, what: &str) -> Result<T>;
}

impl<T> OptionExt<T> for std::result::Result<Option<T>, AppError> {
    fn or_not_found(self, what: &str) -> Result<T> {
        self?.ok_or_else(|| AppError::NotFound(what.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::Gateway(msg) => {
                tracing::warn!("Gateway rejected request: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    "Payment provider error",
                    Some(msg.clone()),
                )
            }
            AppError::GatewayUnavailable(msg) => {
                tracing::error!("Gateway unavailable: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Payment provider unavailable",
                    None,
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
