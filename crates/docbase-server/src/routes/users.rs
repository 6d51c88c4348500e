//! User registration and lookup.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::routes::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user))
}

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    email: String,
    full_name: String,
}

/// POST /api/users — register an identity. The returned id is what the
/// `x-user-id` header carries afterwards.
async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    if req.username.trim().is_empty() || req.email.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "username and email are required" })),
        );
    }
    match state
        .store
        .create_user(&req.username, &req.email, &req.full_name)
    {
        Ok(user) => (StatusCode::CREATED, Json(json!({ "user": user }))),
        Err(e) => {
            // Unique-constraint violations are a caller mistake.
            if e.to_string().contains("UNIQUE constraint") {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "username or email already taken" })),
                )
            } else {
                error_response(e)
            }
        }
    }
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_user(id) {
        Ok(Some(user)) => (StatusCode::OK, Json(json!({ "user": user }))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" })),
        ),
        Err(e) => error_response(e),
    }
}
