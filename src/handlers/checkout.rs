//! Checkout session creation and status proxy.
//!
//! Creating a session performs no local writes; participation only comes
//! into existence when the completion webhook arrives.

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{Event, ParticipantStatus, User};
use crate::payments::{CheckoutRequest, CheckoutSession, SessionStatus};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/checkout-session", post(create_checkout_session))
        .route("/checkout/session-status", get(session_status))
}

/// Eligibility checks, in order. Returns the event and the chef once the
/// requester may pay; the live `charges_enabled` check happens after these
/// because it costs a gateway round trip.
fn validate_checkout_requirements(
    conn: &rusqlite::Connection,
    event_id: &str,
    foodie_id: &str,
) -> Result<(Event, User)> {
    let event = queries::get_event_by_id(conn, event_id).or_not_found(msg::EVENT_NOT_FOUND)?;

    if event.host_user_id == foodie_id {
        return Err(AppError::BadRequest(msg::HOST_CANNOT_JOIN.into()));
    }
    if event.event_date <= queries::now() {
        return Err(AppError::BadRequest(msg::EVENT_IN_PAST.into()));
    }

    let existing = queries::get_participation(conn, event_id, foodie_id)?;
    if existing.is_some_and(|p| p.status == ParticipantStatus::Confirmed) {
        return Err(AppError::BadRequest(msg::ALREADY_JOINED.into()));
    }

    if queries::confirmed_count(conn, event_id)? >= event.max_participants {
        return Err(AppError::BadRequest(msg::EVENT_FULL.into()));
    }

    let chef =
        queries::get_user_by_id(conn, &event.host_user_id).or_not_found(msg::CHEF_NOT_FOUND)?;
    if chef.stripe_account_id.is_none() {
        return Err(AppError::BadRequest(msg::CHEF_PAYMENT_NOT_CONFIGURED.into()));
    }

    Ok((event, chef))
}

async fn create_checkout_session(
    State(state): State<AppState>,
    AuthUser(foodie_id): AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<CheckoutSession>> {
    let (event, chef) = {
        let conn = state.db.get()?;
        validate_checkout_requirements(&conn, &event_id, &foodie_id)?
    };

    let chef_account_id = chef
        .stripe_account_id
        .ok_or_else(|| AppError::BadRequest(msg::CHEF_PAYMENT_NOT_CONFIGURED.into()))?;

    // Onboarding flag in the DB can be stale; the gateway is authoritative
    // for whether the account can take charges right now.
    let account = state.gateway.get_account_status(&chef_account_id).await?;
    if !account.charges_enabled {
        return Err(AppError::BadRequest(msg::CHEF_PAYMENT_NOT_READY.into()));
    }

    let session = state
        .gateway
        .create_checkout_session(&CheckoutRequest {
            event_id: event.id.clone(),
            foodie_id: foodie_id.clone(),
            chef_id: event.host_user_id.clone(),
            chef_account_id,
            amount_cents: event.price,
            currency: event.currency.clone(),
            product_name: event.title.clone(),
            return_url: format!(
                "{}/events/{}/return?session_id={{CHECKOUT_SESSION_ID}}",
                state.frontend_url, event.id
            ),
            capture_manually: state.require_host_approval,
        })
        .await?;

    tracing::info!(
        "Checkout session {} created for event {} by {}",
        session.id,
        event.id,
        foodie_id
    );

    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
struct SessionStatusParams {
    session_id: String,
}

async fn session_status(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(params): Query<SessionStatusParams>,
) -> Result<Json<SessionStatus>> {
    let status = state
        .gateway
        .retrieve_session_status(&params.session_id)
        .await?;
    Ok(Json(status))
}
