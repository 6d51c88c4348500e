//! HTTP route handlers.

pub mod chat;
pub mod documents;
pub mod ocr;
pub mod search;
pub mod stats;
pub mod users;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use docbase_core::Error;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = (state.config.max_upload_mb as usize) * 1024 * 1024;
    Router::new()
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(users::routes())
        .merge(documents::routes())
        .merge(search::routes())
        .merge(chat::routes())
        .merge(ocr::routes())
        .merge(stats::routes())
}

/// Map a service error to an HTTP error response.
pub(crate) fn error_response(err: Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}
