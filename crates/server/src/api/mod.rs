//! HTTP handlers, one module per resource.
//!
//! Errors share one body shape: `{"status": "error", "detail": ".."}`.

mod articles;
mod chat;
mod health;
mod ingest;
mod settings;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn error_response(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({ "status": "error", "detail": detail.into() })),
    )
}

pub(crate) fn internal_error(err: impl std::fmt::Display) -> ApiError {
    error!(error = %err, "request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub use articles::{articles_delete, articles_delete_all, articles_list, categories_list};
pub use chat::chat;
pub use health::health;
pub use ingest::{ingest_runs, ingest_status, ingest_trigger};
pub use settings::{config_get, config_update};
