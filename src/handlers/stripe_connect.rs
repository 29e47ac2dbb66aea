//! Connected-account onboarding and status sync for hosts.

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::payments::AccountStatus;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/stripe/connect", post(connect))
        .route("/users/stripe/status", get(status))
        .route("/users/stripe/login", get(login_link))
}

#[derive(Debug, Serialize)]
struct LinkResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    stripe_account_id: String,
    #[serde(flatten)]
    status: AccountStatus,
    onboarding_complete: bool,
}

/// Create (or reuse) a connected account and return an onboarding link.
async fn connect(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<LinkResponse>> {
    let user = {
        let conn = state.db.get()?;
        queries::get_user_by_id(&conn, &user_id).or_not_found(msg::USER_NOT_FOUND)?
    };

    // Reuse an existing account so repeated onboarding attempts don't
    // scatter orphan accounts at the gateway.
    let account_id = match user.stripe_account_id {
        Some(id) => id,
        None => {
            let id = state.gateway.create_connected_account(&user.email).await?;
            let conn = state.db.get()?;
            queries::set_stripe_account(&conn, &user_id, &id)?;
            tracing::info!("Created connected account {} for user {}", id, user_id);
            id
        }
    };

    let refresh_url = format!("{}/stripe/refresh", state.frontend_url);
    let return_url = format!("{}/stripe/return", state.frontend_url);
    let url = state
        .gateway
        .create_account_link(&account_id, &refresh_url, &return_url)
        .await?;

    Ok(Json(LinkResponse { url }))
}

/// Live status from the gateway; persists `details_submitted` so checkout
/// eligibility doesn't depend on webhook delivery.
async fn status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<StatusResponse>> {
    let user = {
        let conn = state.db.get()?;
        queries::get_user_by_id(&conn, &user_id).or_not_found(msg::USER_NOT_FOUND)?
    };

    let account_id = user
        .stripe_account_id
        .ok_or_else(|| AppError::BadRequest(msg::STRIPE_NOT_CONNECTED.into()))?;

    let status = state.gateway.get_account_status(&account_id).await?;

    if status.details_submitted != user.stripe_onboarding_complete {
        let conn = state.db.get()?;
        queries::set_stripe_onboarding(&conn, &user_id, status.details_submitted)?;
    }

    Ok(Json(StatusResponse {
        stripe_account_id: account_id,
        status,
        onboarding_complete: status.details_submitted,
    }))
}

async fn login_link(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<LinkResponse>> {
    let user = {
        let conn = state.db.get()?;
        queries::get_user_by_id(&conn, &user_id).or_not_found(msg::USER_NOT_FOUND)?
    };

    let account_id = user
        .stripe_account_id
        .ok_or_else(|| AppError::BadRequest(msg::STRIPE_NOT_CONNECTED.into()))?;

    let url = state.gateway.create_login_link(&account_id).await?;
    Ok(Json(LinkResponse { url }))
}
