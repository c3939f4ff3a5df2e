use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{error_response, internal_error, ApiError};
use crate::chat::{answer, ChatReply};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// POST /api/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    answer(&state.store, state.chat_provider.as_deref(), message)
        .await
        .map(Json)
        .map_err(internal_error)
}
