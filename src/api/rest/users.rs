use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::User;
use crate::state::AppState;
use crate::store::{self, Collection};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(create_user).get(list_users))
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_driver: bool,
    #[serde(default)]
    pub is_admin: bool,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if let Some(email) = &payload.email {
        if !email.contains('@') {
            return Err(AppError::BadRequest(format!("invalid email: {email}")));
        }
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        email: payload.email,
        phone: payload.phone,
        is_driver: payload.is_driver,
        is_admin: payload.is_admin,
        timestamp_created: now,
        timestamp_updated: now,
    };

    store::upsert(state.store.as_ref(), Collection::Users, &user.id, &user).await?;
    Ok(Json(user))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, AppError> {
    let users = store::fetch_all::<User>(state.store.as_ref(), Collection::Users).await?;
    Ok(Json(users))
}
