//! Connect webhook endpoint: connected-account lifecycle events, signed
//! with the Connect endpoint secret.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::AppState;
use crate::payments::{StripeAccountObject, StripeWebhookEvent, WebhookEndpoint};

use super::common::{
    extract_signature, process_account_updated, verify_signature, WebhookResult,
};

pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    let signature = match extract_signature(&headers) {
        Ok(s) => s,
        Err(e) => return e,
    };
    if let Err(e) = verify_signature(&state, WebhookEndpoint::Connect, &body, &signature) {
        return e;
    }

    // Signature passed; everything below acknowledges 2xx so the provider
    // does not retry payloads a retry cannot fix.
    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse Connect webhook: {}", e);
            return (StatusCode::OK, "Invalid JSON");
        }
    };

    match event.event_type.as_str() {
        "account.updated" => {
            let account: StripeAccountObject = match serde_json::from_value(event.data.object) {
                Ok(a) => a,
                Err(e) => {
                    tracing::error!("Failed to parse account object: {}", e);
                    return (StatusCode::OK, "Invalid account object");
                }
            };
            process_account_updated(&state, &account)
        }
        _ => (StatusCode::OK, "Event ignored"),
    }
}
