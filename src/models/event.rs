use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A hosted meal event. `current_participants` is a denormalized count of
/// confirmed participants; it is only ever mutated in the same transaction
/// as the participation row that justifies the change.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    pub host_user_id: String,
    pub meal_id: String,
    pub title: String,
    pub description: String,
    pub max_participants: i64,
    pub current_participants: i64,
    pub location: String,
    /// Unix seconds.
    pub event_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Price in minor currency units (cents).
    pub price: i64,
    pub currency: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateEvent {
    pub meal_id: String,
    pub title: String,
    pub description: String,
    pub max_participants: i64,
    pub location: String,
    /// Unix seconds.
    pub event_date: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    pub price: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "usd".to_string()
}

impl CreateEvent {
    pub fn validate(&self, now: i64) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("Title cannot be empty".into()));
        }
        if self.max_participants < 1 {
            return Err(AppError::BadRequest(
                "max_participants must be at least 1".into(),
            ));
        }
        if self.event_date <= now {
            return Err(AppError::BadRequest("event_date must be in the future".into()));
        }
        if self.price < 0 {
            return Err(AppError::BadRequest("price cannot be negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub max_participants: Option<i64>,
    pub location: Option<String>,
    pub event_date: Option<i64>,
    pub image_url: Option<String>,
    pub price: Option<i64>,
}
