//! Stripe webhook receivers.
//!
//! Two endpoints, two secrets: platform events (checkout completions) and
//! Connect events (connected-account updates). Signatures are verified
//! before the payload is trusted; after a valid signature every outcome is
//! acknowledged 2xx so the provider stops retrying, with failures logged
//! locally instead of surfaced as 5xx.

mod common;
mod connect;
mod platform;

pub use common::WebhookResult;

use axum::{routing::post, Router};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/stripe", post(platform::handle))
        .route("/webhooks/stripe-connect", post(connect::handle))
}
