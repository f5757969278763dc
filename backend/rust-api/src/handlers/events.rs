use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::models::EventRequest;
use crate::services::dispatcher::{DispatchError, Dispatcher};
use crate::services::AppState;

/// Inbound edge of the transport collaborator: the messenger gateway posts
/// one normalized event per user action.
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EventRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Err(e) = request.validate() {
        return Err((StatusCode::BAD_REQUEST, e.to_string()));
    }

    tracing::debug!(
        "Inbound event for chat {} from user {}",
        request.chat_id,
        request.from.user_id
    );

    let dispatcher = Dispatcher::new(state);
    match dispatcher.dispatch(request).await {
        Ok(()) => Ok((StatusCode::OK, Json(json!({ "status": "ok" })))),
        Err(DispatchError::Invalid(msg)) => Err((StatusCode::BAD_REQUEST, msg)),
        Err(DispatchError::Internal(e)) => {
            tracing::error!("Event dispatch failed: {:#}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
