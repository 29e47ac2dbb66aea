pub mod checkout;
pub mod events;
pub mod meals;
pub mod stripe_connect;
pub mod users;
pub mod webhooks;

use axum::{routing::get, Json, Router};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(users::router())
        .merge(stripe_connect::router())
        .merge(meals::router())
        .merge(events::router())
        .merge(checkout::router())
        .merge(webhooks::router())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
