//! Manual ingestion trigger and run inspection.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use intel_ingest::{JobInfo, RunOutcome, RunRecord, SchedulerState, TriggerKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{internal_error, ApiError};
use crate::state::AppState;

const DEFAULT_RUNS_LIMIT: usize = 20;

/// POST /api/ingest: run the pipeline now. Waits for the run to finish.
pub async fn ingest_trigger(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    match state.pipeline.run(TriggerKind::Manual).await {
        Ok(RunOutcome::Completed(report)) => Ok(Json(json!({
            "status": "success",
            "new_articles": report.new_items,
            "run_id": report.run_id,
            "fetched": report.fetched,
            "analyzed": report.analyzed,
            "failed": report.failed,
            "duplicates": report.duplicates,
            "duration_ms": report.duration_ms,
        }))),
        Ok(RunOutcome::Busy) => Ok(Json(json!({
            "status": "busy",
            "message": "Ingestion already in progress",
        }))),
        Err(e) => Err(internal_error(e)),
    }
}

#[derive(Serialize)]
pub struct IngestStatus {
    pub running: bool,
    pub scheduler_state: SchedulerState,
    pub job: Option<JobInfo>,
    pub last_run: Option<RunRecord>,
}

/// GET /api/ingest/status
pub async fn ingest_status(State(state): State<Arc<AppState>>) -> Json<IngestStatus> {
    Json(IngestStatus {
        running: state.pipeline.is_running(),
        scheduler_state: state.scheduler.state().await,
        job: state.scheduler.job().await,
        last_run: state.pipeline.history().last(),
    })
}

#[derive(Deserialize)]
pub struct RunsParams {
    pub limit: Option<usize>,
}

/// GET /api/ingest/runs, newest first.
pub async fn ingest_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunsParams>,
) -> Json<Vec<RunRecord>> {
    let limit = params.limit.unwrap_or(DEFAULT_RUNS_LIMIT);
    Json(state.pipeline.history().recent(limit))
}
