use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::auth::{hash_password, verify_password, AuthUser};
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{CreateUser, LoginRequest, LoginResponse, UpdateUser, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(signup))
        .route("/users/login", post(login))
        .route("/users/search", get(search))
        .route("/users/{id}", get(get_user).patch(update_user))
}

async fn signup(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<LoginResponse>)> {
    input.validate()?;
    let password_hash = hash_password(&input.password)?;

    let conn = state.db.get()?;
    let user = queries::create_user(&conn, &input, &password_hash)?;
    let access_token = state.tokens.issue(&user.id)?;

    tracing::info!("User signed up: {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            access_token,
            token_type: "bearer",
            user,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let conn = state.db.get()?;
    let user = queries::get_user_by_email(&conn, &input.email)?
        .ok_or_else(|| AppError::BadRequest(msg::INVALID_CREDENTIALS.into()))?;

    if !verify_password(&input.password, &user.password_hash) {
        return Err(AppError::BadRequest(msg::INVALID_CREDENTIALS.into()));
    }

    let access_token = state.tokens.issue(&user.id)?;
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    let conn = state.db.get()?;
    let user = queries::get_user_by_id(&conn, &id).or_not_found(msg::USER_NOT_FOUND)?;
    Ok(Json(user))
}

async fn update_user(
    State(state): State<AppState>,
    AuthUser(auth_id): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateUser>,
) -> Result<Json<User>> {
    if auth_id != id {
        return Err(AppError::Forbidden("Cannot update another user".into()));
    }

    let conn = state.db.get()?;
    queries::get_user_by_id(&conn, &id).or_not_found(msg::USER_NOT_FOUND)?;
    let user = queries::update_user(&conn, &id, &input).or_not_found(msg::USER_NOT_FOUND)?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    limit: Option<i64>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<User>>> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let conn = state.db.get()?;
    let users = queries::search_users(&conn, &params.query, limit)?;
    Ok(Json(users))
}
