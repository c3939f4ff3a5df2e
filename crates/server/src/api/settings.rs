//! Settings file read/write. A successful write is applied to the running
//! fetcher, analyzer and scheduler before the response goes out, in one
//! step that concurrent writers cannot interleave.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use intel_ingest::{ConfigError, SchedulerError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{error_response, internal_error, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ConfigRequest {
    pub config: String,
}

/// GET /api/config: raw settings text.
pub async fn config_get(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let raw = state.config_store().load_raw().map_err(internal_error)?;
    Ok(Json(json!({ "config": raw })))
}

/// POST /api/config
pub async fn config_update(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConfigRequest>,
) -> Result<Json<Value>, ApiError> {
    let settings = state
        .scheduler
        .update_settings(state.config_store().as_ref(), &request.config, |settings| {
            state.fetcher.reload(settings);
            state.analyzer.reload(settings);
        })
        .await
        .map_err(|e| match e {
            SchedulerError::InvalidConfig(ConfigError::Yaml(_) | ConfigError::Invalid(_)) => {
                error_response(StatusCode::BAD_REQUEST, e.to_string())
            }
            SchedulerError::Stopped => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            _ => internal_error(e),
        })?;

    info!(
        feeds = settings.feeds.len(),
        scheduling_enabled = settings.scheduling.enabled,
        "settings applied"
    );
    Ok(Json(json!({ "status": "success" })))
}
