use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{CreateMeal, Meal, UpdateMeal};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal).get(list_meals))
        .route(
            "/meals/{id}",
            get(get_meal).put(update_meal).delete(delete_meal),
        )
}

async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<CreateMeal>,
) -> Result<(StatusCode, Json<Meal>)> {
    input.validate()?;
    let conn = state.db.get()?;
    queries::get_user_by_id(&conn, &user_id).or_not_found(msg::USER_NOT_FOUND)?;
    let meal = queries::create_meal(&conn, &user_id, &input)?;
    Ok((StatusCode::CREATED, Json(meal)))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    user_id: String,
}

async fn list_meals(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Meal>>> {
    let conn = state.db.get()?;
    let meals = queries::list_meals_by_user(&conn, &params.user_id)?;
    Ok(Json(meals))
}

async fn get_meal(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Meal>> {
    let conn = state.db.get()?;
    let meal = queries::get_meal_by_id(&conn, &id).or_not_found(msg::MEAL_NOT_FOUND)?;
    Ok(Json(meal))
}

async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateMeal>,
) -> Result<Json<Meal>> {
    let conn = state.db.get()?;
    let meal = queries::get_meal_by_id(&conn, &id).or_not_found(msg::MEAL_NOT_FOUND)?;
    if meal.user_id != user_id {
        return Err(AppError::Forbidden("Not the meal owner".into()));
    }
    let meal = queries::update_meal(&conn, &id, &input).or_not_found(msg::MEAL_NOT_FOUND)?;
    Ok(Json(meal))
}

async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    let meal = queries::get_meal_by_id(&conn, &id).or_not_found(msg::MEAL_NOT_FOUND)?;
    if meal.user_id != user_id {
        return Err(AppError::Forbidden("Not the meal owner".into()));
    }
    queries::soft_delete_meal(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
