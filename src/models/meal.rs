use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A dish a user can attach to events they host.
#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub ingredients: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateMeal {
    pub title: String,
    pub description: String,
    pub ingredients: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CreateMeal {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("Title cannot be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeal {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<String>,
    pub image_url: Option<String>,
}
