//! Event CRUD, participant listing, host acceptance, and the refund flow.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::queries::{self, AcceptOutcome};
use crate::db::AppState;
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{
    check_refund_window, refund_amount_cents, CreateEvent, Event, EventParticipantUser,
    ParticipantStatus, RefundResponse, UpdateEvent,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/me", get(my_events))
        .route("/events/me/joined", get(joined_events))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/{id}/participants", get(list_participants))
        .route(
            "/events/{id}/participants/{user_id}/accept",
            post(accept_participant),
        )
        .route("/events/{id}/refund", post(refund))
}

async fn create_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<CreateEvent>,
) -> Result<(StatusCode, Json<Event>)> {
    input.validate(queries::now())?;

    let conn = state.db.get()?;
    queries::get_user_by_id(&conn, &user_id).or_not_found(msg::USER_NOT_FOUND)?;
    let meal =
        queries::get_meal_by_id(&conn, &input.meal_id).or_not_found(msg::MEAL_NOT_FOUND)?;
    if meal.user_id != user_id {
        return Err(AppError::Forbidden("Meal belongs to another user".into()));
    }

    let event = queries::create_event(&conn, &user_id, &input)?;
    tracing::info!("Event created: {} by {}", event.id, user_id);
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    user_id: Option<String>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Event>>> {
    let conn = state.db.get()?;
    let events = match params.user_id {
        Some(host_id) => queries::list_events_by_host(&conn, &host_id)?,
        None => queries::list_events(&conn)?,
    };
    Ok(Json(events))
}

async fn my_events(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Event>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_events_by_host(&conn, &user_id)?))
}

async fn joined_events(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Event>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_joined_events(&conn, &user_id)?))
}

async fn get_event(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Event>> {
    let conn = state.db.get()?;
    let event = queries::get_event_by_id(&conn, &id).or_not_found(msg::EVENT_NOT_FOUND)?;
    Ok(Json(event))
}

async fn update_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateEvent>,
) -> Result<Json<Event>> {
    let conn = state.db.get()?;
    let event = queries::get_event_by_id(&conn, &id).or_not_found(msg::EVENT_NOT_FOUND)?;
    if event.host_user_id != user_id {
        return Err(AppError::Forbidden(msg::NOT_EVENT_HOST.into()));
    }

    if let Some(max) = input.max_participants {
        if max < event.current_participants {
            return Err(AppError::BadRequest(
                "max_participants cannot be below current participants".into(),
            ));
        }
    }
    if let Some(date) = input.event_date {
        if date <= queries::now() {
            return Err(AppError::BadRequest("event_date must be in the future".into()));
        }
    }
    if let Some(price) = input.price {
        if price < 0 {
            return Err(AppError::BadRequest("price cannot be negative".into()));
        }
    }

    let event = queries::update_event(&conn, &id, &input).or_not_found(msg::EVENT_NOT_FOUND)?;
    Ok(Json(event))
}

async fn delete_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    let (event, is_deleted) =
        queries::get_event_any(&conn, &id).or_not_found(msg::EVENT_NOT_FOUND)?;
    if event.host_user_id != user_id {
        return Err(AppError::Forbidden(msg::NOT_EVENT_HOST.into()));
    }
    if is_deleted {
        return Err(AppError::BadRequest("Event already deleted".into()));
    }
    queries::soft_delete_event(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventParticipantUser>>> {
    let conn = state.db.get()?;
    queries::get_event_by_id(&conn, &id).or_not_found(msg::EVENT_NOT_FOUND)?;
    Ok(Json(queries::list_event_participants(&conn, &id)?))
}

/// Host accepts a booked participant: capture the authorized payment at the
/// gateway first, then promote the row. The gateway call never runs inside
/// the local transaction.
async fn accept_participant(
    State(state): State<AppState>,
    AuthUser(auth_id): AuthUser,
    Path((event_id, user_id)): Path<(String, String)>,
) -> Result<Json<EventParticipantUser>> {
    let (event, participation) = {
        let conn = state.db.get()?;
        let event =
            queries::get_event_by_id(&conn, &event_id).or_not_found(msg::EVENT_NOT_FOUND)?;
        if event.host_user_id != auth_id {
            return Err(AppError::Forbidden(msg::NOT_EVENT_HOST.into()));
        }
        let participation = queries::get_participation(&conn, &event_id, &user_id)?
            .filter(|p| p.status == ParticipantStatus::Booked)
            .ok_or_else(|| AppError::BadRequest(msg::NO_PENDING_PARTICIPATION.into()))?;
        (event, participation)
    };

    let payment_intent = participation
        .payment_intent_id
        .ok_or_else(|| AppError::BadRequest(msg::PAYMENT_NOT_FOUND.into()))?;

    state.gateway.capture_payment_intent(&payment_intent).await?;

    let mut conn = state.db.get()?;
    match queries::finalize_acceptance(&mut conn, &event_id, &user_id)? {
        AcceptOutcome::Accepted => {}
        AcceptOutcome::NoLongerBooked => {
            // Capture already happened; concurrent mutation won the race.
            tracing::error!(
                "Captured payment {} but participation {}/{} is no longer booked",
                payment_intent,
                event_id,
                user_id
            );
            return Err(AppError::Conflict(msg::NO_PENDING_PARTICIPATION.into()));
        }
        AcceptOutcome::CapacityExceeded => {
            tracing::error!(
                "Captured payment {} but event {} is full; needs manual reconciliation",
                payment_intent,
                event_id
            );
            return Err(AppError::Conflict(msg::EVENT_FULL.into()));
        }
    }

    tracing::info!("Host accepted participant {} for event {}", user_id, event.id);

    let conn = state.db.get()?;
    let participant = queries::list_event_participants(&conn, &event_id)?
        .into_iter()
        .find(|p| p.id == user_id)
        .ok_or_else(|| AppError::Internal("Participant vanished after acceptance".into()))?;
    Ok(Json(participant))
}

async fn refund(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<RefundResponse>> {
    let (event, participation) = {
        let conn = state.db.get()?;
        let event =
            queries::get_event_by_id(&conn, &event_id).or_not_found(msg::EVENT_NOT_FOUND)?;
        let participation = queries::get_participation(&conn, &event_id, &user_id)?
            .ok_or_else(|| AppError::BadRequest(msg::NOT_REGISTERED.into()))?;
        (event, participation)
    };

    // A cancelled row with refunded_at set is a repeat request, not an
    // unregistered user.
    if participation.refunded_at.is_some() {
        return Err(AppError::BadRequest(msg::ALREADY_REFUNDED.into()));
    }
    if participation.status != ParticipantStatus::Confirmed {
        return Err(AppError::BadRequest(msg::NOT_REGISTERED.into()));
    }

    let payment_intent = participation
        .payment_intent_id
        .ok_or_else(|| AppError::BadRequest(msg::PAYMENT_NOT_FOUND.into()))?;

    check_refund_window(participation.joined_at, event.event_date, queries::now())?;

    let amount = refund_amount_cents(event.price);

    // Gateway call strictly before the local transaction; reverse_transfer
    // claws the host's share back proportionally.
    let refund_id = state
        .gateway
        .create_refund(&payment_intent, amount, true)
        .await?;

    let mut conn = state.db.get()?;
    if !queries::apply_refund(&mut conn, &event_id, &user_id)? {
        // Money moved at the gateway but the row was no longer refundable.
        tracing::error!(
            "Refund {} issued but no refundable participation {}/{} remained",
            refund_id,
            event_id,
            user_id
        );
        return Err(AppError::Internal("Refund reconciliation required".into()));
    }

    tracing::info!(
        "Refunded {} cents to user {} for event {} (refund {})",
        amount,
        user_id,
        event_id,
        refund_id
    );

    Ok(Json(RefundResponse {
        refund_amount_cents: amount,
        message: format!("Refunded {}% of the event price", crate::models::REFUND_PERCENT),
    }))
}
