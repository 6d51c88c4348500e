//! Aggregate statistics route.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::identity::Identity;
use crate::routes::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(stats))
}

/// GET /api/stats — document, chat, and OCR aggregates.
async fn stats(
    State(state): State<Arc<AppState>>,
    Identity(_user_id): Identity,
) -> impl IntoResponse {
    let documents = match state.store.document_stats() {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };
    let chat = match state.store.chat_stats(None) {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };
    let ocr = match state.store.ocr_stats(None) {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    (
        axum::http::StatusCode::OK,
        Json(json!({
            "documents": documents,
            "chat": chat,
            "ocr": ocr,
            "embedding_model": state.embedder.model(),
        })),
    )
}
