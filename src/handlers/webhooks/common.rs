//! Shared webhook plumbing: signature extraction/verification and the
//! event processors both endpoints dispatch into.

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
};

use crate::db::queries::{self, ConfirmOutcome};
use crate::db::AppState;
use crate::payments::{StripeAccountObject, StripeCheckoutSessionObject, WebhookEndpoint};

/// Status and message acknowledged back to the provider.
pub type WebhookResult = (StatusCode, &'static str);

pub fn extract_signature(headers: &HeaderMap) -> Result<String, WebhookResult> {
    headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid signature header"))
}

/// Signature gate. Nothing in the body may be trusted before this passes.
pub fn verify_signature(
    state: &AppState,
    endpoint: WebhookEndpoint,
    body: &Bytes,
    signature: &str,
) -> Result<(), WebhookResult> {
    match state.gateway.verify_webhook_signature(body, signature, endpoint) {
        Ok(true) => Ok(()),
        Ok(false) => Err((StatusCode::BAD_REQUEST, "Invalid signature")),
        Err(e) => {
            tracing::warn!("Webhook signature verification failed: {}", e);
            Err((StatusCode::BAD_REQUEST, "Invalid signature"))
        }
    }
}

/// Apply a verified `checkout.session.completed` event.
///
/// Always acknowledges; a redelivered event finds the row already confirmed
/// and no-ops. Capacity exhausted at commit time means money moved for a
/// seat that no longer exists, which is logged for manual reconciliation
/// rather than bounced back at the provider.
pub fn process_checkout_completed(
    state: &AppState,
    session: &StripeCheckoutSessionObject,
) -> WebhookResult {
    if !state.require_host_approval
        && session.payment_status.as_deref() != Some("paid")
    {
        return (StatusCode::OK, "Session not paid");
    }

    let (Some(event_id), Some(foodie_id)) = (
        session.metadata.event_id.as_deref(),
        session.metadata.foodie_id.as_deref(),
    ) else {
        tracing::warn!("Checkout session {} missing metadata ids", session.id);
        return (StatusCode::OK, "Missing metadata");
    };

    let Some(payment_intent) = session.payment_intent.as_deref() else {
        tracing::warn!("Checkout session {} has no payment intent", session.id);
        return (StatusCode::OK, "Missing payment intent");
    };

    // Local failures past this point are acknowledged 2xx: the provider
    // retrying cannot fix them, and logs carry the details.
    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Webhook DB connection error: {}", e);
            return (StatusCode::OK, "Database error");
        }
    };

    let outcome = match queries::confirm_participation(
        &mut conn,
        event_id,
        foodie_id,
        payment_intent,
        state.require_host_approval,
    ) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!("Failed to apply checkout completion: {}", e);
            return (StatusCode::OK, "Database error");
        }
    };

    match outcome {
        ConfirmOutcome::Created | ConfirmOutcome::Confirmed => {
            tracing::info!(
                "Participation confirmed: event={} foodie={} intent={}",
                event_id,
                foodie_id,
                payment_intent
            );
            (StatusCode::OK, "OK")
        }
        ConfirmOutcome::BookedPending => {
            tracing::info!(
                "Participation booked pending host acceptance: event={} foodie={}",
                event_id,
                foodie_id
            );
            (StatusCode::OK, "Booked")
        }
        ConfirmOutcome::AlreadyConfirmed => (StatusCode::OK, "Already processed"),
        ConfirmOutcome::CapacityExceeded => {
            tracing::error!(
                "Paid checkout for full event: event={} foodie={} intent={}; \
                 manual reconciliation required",
                event_id,
                foodie_id,
                payment_intent
            );
            (StatusCode::OK, "Event full")
        }
        ConfirmOutcome::EventNotFound => {
            tracing::warn!("Checkout completion for unknown event {}", event_id);
            (StatusCode::OK, "Event not found")
        }
    }
}

/// Apply a verified `account.updated` event: mirror `details_submitted`
/// onto the owning user. Unknown accounts are acknowledged and dropped.
pub fn process_account_updated(state: &AppState, account: &StripeAccountObject) -> WebhookResult {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Webhook DB connection error: {}", e);
            return (StatusCode::OK, "Database error");
        }
    };

    let user = match queries::get_user_by_stripe_account(&conn, &account.id) {
        Ok(Some(u)) => u,
        Ok(None) => {
            tracing::debug!("account.updated for unknown account {}", account.id);
            return (StatusCode::OK, "Unknown account");
        }
        Err(e) => {
            tracing::error!("Failed to look up account {}: {}", account.id, e);
            return (StatusCode::OK, "Database error");
        }
    };

    let complete = account.details_submitted.unwrap_or(false);
    if complete != user.stripe_onboarding_complete {
        if let Err(e) = queries::set_stripe_onboarding(&conn, &user.id, complete) {
            tracing::error!("Failed to update onboarding flag for {}: {}", user.id, e);
            return (StatusCode::OK, "Database error");
        }
        tracing::info!(
            "Connected account {} onboarding_complete={} (user {})",
            account.id,
            complete,
            user.id
        );
    }

    (StatusCode::OK, "OK")
}
