//! Chat routes: sessions and RAG turns.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::identity::Identity;
use crate::routes::documents::{unknown_user, user_exists};
use crate::routes::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/sessions", get(list_sessions).post(create_session))
        .route(
            "/chat/sessions/{id}",
            axum::routing::put(rename_session).delete(delete_session),
        )
        .route(
            "/chat/sessions/{id}/messages",
            get(session_history).post(send_message),
        )
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    title: Option<String>,
    system_prompt: Option<String>,
}

/// POST /api/chat/sessions
async fn create_session(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Json(req): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    if !user_exists(&state, user_id) {
        return unknown_user();
    }
    match state
        .chat
        .create_session(user_id, req.title.as_deref(), req.system_prompt.as_deref())
    {
        Ok(session) => (StatusCode::CREATED, Json(json!({ "session": session }))),
        Err(e) => error_response(e),
    }
}

/// GET /api/chat/sessions — active sessions of the caller.
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
) -> impl IntoResponse {
    match state.store.sessions_for_user(user_id, 20) {
        Ok(sessions) => (
            StatusCode::OK,
            Json(json!({ "sessions": sessions, "total": sessions.len() })),
        ),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct SendMessageRequest {
    message: String,
    #[serde(default = "default_use_rag")]
    use_rag: bool,
    rag_limit: Option<usize>,
}

fn default_use_rag() -> bool {
    true
}

/// POST /api/chat/sessions/{id}/messages — one chat turn.
async fn send_message(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(session_id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> impl IntoResponse {
    if !session_belongs_to(&state, session_id, user_id) {
        return session_not_found();
    }

    match state
        .chat
        .send_message(session_id, user_id, &req.message, req.use_rag, req.rag_limit)
        .await
    {
        Some(outcome) => (
            StatusCode::OK,
            Json(json!({
                "message_id": outcome.message_id,
                "response": outcome.response,
                "context": outcome.context,
                "tokens_used": outcome.tokens_used,
                "response_time": outcome.response_time,
            })),
        ),
        None => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "The assistant could not produce an answer" })),
        ),
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// GET /api/chat/sessions/{id}/messages
async fn session_history(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(session_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    if !session_belongs_to(&state, session_id, user_id) {
        return session_not_found();
    }
    match state
        .store
        .messages_for_session(session_id, query.limit.unwrap_or(50))
    {
        Ok(messages) => (
            StatusCode::OK,
            Json(json!({ "messages": messages, "total": messages.len() })),
        ),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct RenameRequest {
    title: String,
}

/// PUT /api/chat/sessions/{id}
async fn rename_session(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(session_id): Path<i64>,
    Json(req): Json<RenameRequest>,
) -> impl IntoResponse {
    match state.store.rename_session(session_id, user_id, &req.title) {
        Ok(true) => (StatusCode::OK, Json(json!({ "renamed": true }))),
        Ok(false) => session_not_found(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/chat/sessions/{id} — soft delete.
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Identity(user_id): Identity,
    Path(session_id): Path<i64>,
) -> impl IntoResponse {
    match state.store.soft_delete_session(session_id, user_id) {
        Ok(true) => (StatusCode::OK, Json(json!({ "deleted": true }))),
        Ok(false) => session_not_found(),
        Err(e) => error_response(e),
    }
}

fn session_belongs_to(state: &AppState, session_id: i64, user_id: i64) -> bool {
    matches!(
        state.store.get_session(session_id),
        Ok(Some(s)) if s.user_id == user_id
    )
}

fn session_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Chat session not found" })),
    )
}
