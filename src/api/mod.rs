// src/api/mod.rs

//! HTTP API for the group crawler.
//!
//! Routes:
//! - `GET /api/parse/groups`: cached or freshly crawled groups
//! - `DELETE /api/parse/groups`: clear the cache
//! - `GET /api/parse/group/{id}`: one group, scraped on demand
//! - `GET /api/parse/allgroups`: discovered group numbers

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::error::AppError;
use crate::models::{GroupRecord, GroupStatistics, iso_millis};
use crate::pipeline::{GroupsPipeline, RefreshOutcome};

/// Shared-cache policy attached to freshly crawled results.
pub const FRESH_CACHE_CONTROL: &str = "public, s-maxage=86400, stale-while-revalidate=43200";

const STALE_ERROR: &str = "Failed to refresh groups, serving cached data";

#[derive(Clone)]
pub struct ApiState {
    pipeline: Arc<GroupsPipeline>,
}

/// Build the application router.
pub fn router(pipeline: Arc<GroupsPipeline>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/parse/groups", get(get_groups).delete(delete_groups))
        .route("/api/parse/group/{id}", get(get_group))
        .route("/api/parse/allgroups", get(get_all_groups))
        .with_state(ApiState { pipeline })
}

/// Body of `GET /api/parse/groups`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsResponse {
    pub success: bool,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
    pub parsed_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub count: usize,
    pub total_groups: usize,
    pub processed_groups: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<GroupStatistics>,
    pub groups: Vec<GroupRecord>,
}

impl GroupsResponse {
    fn from_outcome(outcome: RefreshOutcome, elapsed_ms: u64) -> Self {
        let (entry, success, error, duration, statistics) = match outcome {
            RefreshOutcome::Cached(entry) => (entry, true, None, Some(elapsed_ms), None),
            RefreshOutcome::Fresh {
                entry,
                duration_ms,
                statistics,
            } => (entry, true, None, Some(duration_ms), Some(statistics)),
            RefreshOutcome::Stale { entry, error } => {
                warn!("Serving stale groups after error: {}", error);
                (entry, false, Some(STALE_ERROR.to_string()), None, None)
            }
        };

        Self {
            success,
            cached: statistics.is_none(),
            error,
            timestamp: entry.timestamp,
            parsed_at: entry.parsed_at(),
            duration,
            count: entry.groups.len(),
            total_groups: entry.total_groups,
            processed_groups: entry.processed_groups,
            statistics,
            groups: entry.groups,
        }
    }
}

/// Body of failed requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    pub timestamp: i64,
    pub parsed_at: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
            timestamp,
            parsed_at: iso_millis(timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct GroupNumber {
    pub number: u32,
}

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(error, message))).into_response()
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[instrument(skip(state))]
async fn get_groups(State(state): State<ApiState>) -> Response {
    let start = Instant::now();

    match state.pipeline.refresh().await {
        Ok(outcome) => {
            let fresh = matches!(outcome, RefreshOutcome::Fresh { .. });
            let body = GroupsResponse::from_outcome(outcome, start.elapsed().as_millis() as u64);
            info!(
                "Returning {} groups (cached={}, success={})",
                body.count, body.cached, body.success
            );
            if fresh {
                ([(header::CACHE_CONTROL, FRESH_CACHE_CONTROL)], Json(body)).into_response()
            } else {
                Json(body).into_response()
            }
        }
        Err(e) => {
            error!("Group refresh failed with no cache to fall back on: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                e.to_string(),
            )
        }
    }
}

#[instrument(skip(state))]
async fn delete_groups(State(state): State<ApiState>) -> Json<MessageResponse> {
    state.pipeline.invalidate().await;
    Json(MessageResponse {
        success: true,
        message: "Cache cleared".to_string(),
        timestamp: Utc::now().timestamp_millis(),
    })
}

#[instrument(skip(state))]
async fn get_group(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Bad request",
            format!("Invalid group number: {id}"),
        );
    }

    match state.pipeline.group(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) | Err(AppError::NotFound { .. }) => error_response(
            StatusCode::NOT_FOUND,
            "Not found",
            format!("Group {id} not found"),
        ),
        Err(e) => {
            error!("Failed to scrape group {}: {}", id, e);
            error_response(StatusCode::BAD_GATEWAY, "Upstream error", e.to_string())
        }
    }
}

#[instrument(skip(state))]
async fn get_all_groups(State(state): State<ApiState>) -> Response {
    match state.pipeline.discover().await {
        Ok(numbers) => Json(
            numbers
                .into_iter()
                .map(|number| GroupNumber { number })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => {
            error!("Group discovery failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                e.to_string(),
            )
        }
    }
}
