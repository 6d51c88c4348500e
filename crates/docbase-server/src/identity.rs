//! Request identity.
//!
//! Every data-touching endpoint requires an explicit `x-user-id` header;
//! there is no implicit default user anywhere in the services.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

/// The authenticated user id for this request.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub i64);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());

        match user_id {
            Some(id) if id > 0 => Ok(Identity(id)),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Missing or invalid x-user-id header" })),
            )),
        }
    }
}
