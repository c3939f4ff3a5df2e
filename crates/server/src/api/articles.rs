//! Article listing, categories and deletion.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use intel_core::Relevance;
use intel_storage::{ArticleQuery, StoredArticle};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error_response, internal_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ArticlesParams {
    pub limit: Option<usize>,
    pub relevance: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

impl ArticlesParams {
    fn into_query(self) -> Result<ArticleQuery, String> {
        let relevance = match self.relevance.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                Relevance::parse(raw).ok_or_else(|| format!("unknown relevance '{raw}'"))?,
            ),
        };
        Ok(ArticleQuery {
            limit: self.limit,
            relevance,
            category: self.category.filter(|c| !c.trim().is_empty()),
            start_date: parse_bound(self.start_date.as_deref(), Bound::Start)?,
            end_date: parse_bound(self.end_date.as_deref(), Bound::End)?,
        })
    }
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD`. A bare end date covers the whole day.
fn parse_bound(raw: Option<&str>, bound: Bound) -> Result<Option<DateTime<Utc>>, String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{raw}', expected YYYY-MM-DD or RFC 3339"))?;
    let datetime = match bound {
        Bound::Start => date.and_hms_opt(0, 0, 0),
        Bound::End => date.and_hms_milli_opt(23, 59, 59, 999),
    };
    datetime
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| format!("invalid date '{raw}'"))
}

/// GET /api/articles
pub async fn articles_list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArticlesParams>,
) -> Result<Json<Vec<StoredArticle>>, ApiError> {
    let query = params
        .into_query()
        .map_err(|detail| error_response(StatusCode::BAD_REQUEST, detail))?;
    let articles = state.store.query(&query).map_err(internal_error)?;
    Ok(Json(articles))
}

/// GET /api/categories
pub async fn categories_list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    state.store.categories().map(Json).map_err(internal_error)
}

/// DELETE /api/articles/{id}
pub async fn articles_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    match state.store.delete(id) {
        Ok(true) => Ok(Json(json!({ "status": "success" }))),
        Ok(false) => Err(error_response(StatusCode::NOT_FOUND, "Article not found")),
        Err(e) => Err(internal_error(e)),
    }
}

/// DELETE /api/articles
pub async fn articles_delete_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let count = state.store.delete_all().map_err(internal_error)?;
    Ok(Json(json!({ "status": "success", "deleted_count": count })))
}
