//! Similarity search route.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::identity::Identity;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/search", post(search))
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    top_k: Option<usize>,
    document_ids: Option<Vec<i64>>,
}

/// POST /api/search — top-k chunks over the embedded corpus.
async fn search(
    State(state): State<Arc<AppState>>,
    Identity(_user_id): Identity,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    let top_k = req.top_k.unwrap_or(state.config.generation.default_top_k);
    let results = state
        .search
        .search(&req.query, top_k, req.document_ids.as_deref())
        .await;

    Json(json!({
        "query": req.query,
        "results": results,
        "total": results.len(),
    }))
}
