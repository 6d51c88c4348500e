//! OCR routes: submit a file, poll tasks.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::identity::Identity;
use crate::routes::documents::{unknown_user, user_exists};
use crate::routes::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ocr", get(list_tasks).post(submit))
        .route("/ocr/{id}", get(get_task))
}

/// POST /api/ocr — multipart file, processed synchronously.
async fn submit(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if !user_exists(&state, user_id) {
        return unknown_user();
    }

    let mut file: Option<(String, Vec<u8>)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("unnamed").to_string();
            match field.bytes().await {
                Ok(bytes) => file = Some((filename, bytes.to_vec())),
                Err(e) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": format!("Could not read upload: {}", e) })),
                    );
                }
            }
        }
    }

    let Some((filename, bytes)) = file else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing file field" })),
        );
    };

    // Scratch copy for the duration of the call.
    let tmp_path = state
        .config
        .data_paths
        .tmp
        .join(format!("{}-{}", Uuid::new_v4(), filename));
    if let Err(e) = std::fs::write(&tmp_path, &bytes) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Could not store upload: {}", e) })),
        );
    }

    let result = state.ocr.process_file(user_id, &tmp_path).await;
    let _ = std::fs::remove_file(&tmp_path);

    match result {
        Ok(task) => (StatusCode::OK, Json(json!({ "task": task }))),
        Err(e) => error_response(e),
    }
}

/// GET /api/ocr/{id}
async fn get_task(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_ocr_task(id) {
        Ok(Some(task)) if task.user_id == user_id => {
            (StatusCode::OK, Json(json!({ "task": task })))
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "OCR task not found" })),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/ocr — the caller's recent tasks.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
) -> impl IntoResponse {
    match state.store.ocr_tasks_for_user(user_id, 20) {
        Ok(tasks) => (
            StatusCode::OK,
            Json(json!({ "tasks": tasks, "total": tasks.len() })),
        ),
        Err(e) => error_response(e),
    }
}
