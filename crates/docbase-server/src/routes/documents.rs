//! Document routes: upload, listing, deletion, and the embedding pass.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::warn;

use crate::identity::Identity;
use crate::routes::error_response;
use crate::state::AppState;
use docbase_ingest::{Ingester, UploadMeta};
use docbase_store::AuditEntry;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/documents", get(list_documents).post(upload_document))
        .route(
            "/documents/{id}",
            get(get_document).delete(delete_document),
        )
        .route("/documents/{id}/embeddings", post(process_embeddings))
}

/// POST /api/documents — multipart upload with optional metadata fields.
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if !user_exists(&state, user_id) {
        return unknown_user();
    }

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut meta = UploadMeta::default();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
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
            "title" => meta.title = field.text().await.ok().filter(|t| !t.is_empty()),
            "description" => meta.description = field.text().await.ok().filter(|t| !t.is_empty()),
            "category" => meta.category = field.text().await.ok().filter(|t| !t.is_empty()),
            "tags" => {
                meta.tags = field.text().await.ok().map(|t| {
                    t.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                });
            }
            "is_public" => {
                meta.is_public = field.text().await.map(|t| t == "true").unwrap_or(false);
            }
            _ => warn!("Ignoring unknown upload field {:?}", name),
        }
    }

    let Some((filename, bytes)) = file else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing file field" })),
        );
    };

    let ingester = Ingester::new(
        &state.store,
        &state.config.data_paths.uploads,
        state.config.max_upload_mb,
    );
    match ingester.ingest_upload(user_id, &filename, &bytes, meta) {
        Ok(document) => {
            audit(&state, user_id, "upload", "document", document.id, true);
            (StatusCode::CREATED, Json(json!({ "document": document })))
        }
        Err(e) => {
            audit_failure(&state, user_id, "upload", &filename);
            error_response(e)
        }
    }
}

/// GET /api/documents — newest first.
async fn list_documents(
    State(state): State<Arc<AppState>>,
    Identity(_user_id): Identity,
) -> impl IntoResponse {
    match state.store.list_documents(100) {
        Ok(documents) => (
            StatusCode::OK,
            Json(json!({ "documents": documents, "total": documents.len() })),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/documents/{id} — also counts the access.
async fn get_document(
    State(state): State<Arc<AppState>>,
    Identity(_user_id): Identity,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_document(id) {
        Ok(Some(document)) => {
            let _ = state.store.increment_access(id);
            (StatusCode::OK, Json(json!({ "document": document })))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Document not found" })),
        ),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/documents/{id} — removes the row, its chunks, and the file.
async fn delete_document(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let ingester = Ingester::new(
        &state.store,
        &state.config.data_paths.uploads,
        state.config.max_upload_mb,
    );
    match ingester.remove_document(id) {
        Ok(true) => {
            audit(&state, user_id, "delete", "document", id, true);
            (StatusCode::OK, Json(json!({ "deleted": true })))
        }
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Document not found" })),
        ),
        Err(e) => error_response(e),
    }
}

/// POST /api/documents/{id}/embeddings — run the embedding pipeline.
async fn process_embeddings(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match docbase_rag::process_document(
        &state.store,
        state.embedder.as_ref(),
        &state.config.embedding,
        id,
        None,
    )
    .await
    {
        Ok(outcome) => {
            audit(&state, user_id, "embed", "document", id, true);
            (
                StatusCode::OK,
                Json(json!({
                    "document_id": id,
                    "chunks_total": outcome.chunks_total,
                    "chunks_embedded": outcome.chunks_embedded,
                    "status": outcome.status,
                })),
            )
        }
        Err(e) => {
            audit(&state, user_id, "embed", "document", id, false);
            error_response(e)
        }
    }
}

pub(crate) fn user_exists(state: &AppState, user_id: i64) -> bool {
    matches!(state.store.get_user(user_id), Ok(Some(_)))
}

pub(crate) fn unknown_user() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unknown user" })),
    )
}

fn audit(
    state: &AppState,
    user_id: i64,
    action: &str,
    resource_type: &str,
    resource_id: i64,
    success: bool,
) {
    let entry = AuditEntry {
        user_id: Some(user_id),
        action: action.to_string(),
        resource_type: Some(resource_type.to_string()),
        resource_id: Some(resource_id.to_string()),
        description: None,
        success,
    };
    if let Err(e) = state.store.record_audit(&entry) {
        warn!("Could not record audit entry: {}", e);
    }
}

fn audit_failure(state: &AppState, user_id: i64, action: &str, description: &str) {
    let entry = AuditEntry {
        user_id: Some(user_id),
        action: action.to_string(),
        resource_type: None,
        resource_id: None,
        description: Some(description.to_string()),
        success: false,
    };
    if let Err(e) = state.store.record_audit(&entry) {
        warn!("Could not record audit entry: {}", e);
    }
}
