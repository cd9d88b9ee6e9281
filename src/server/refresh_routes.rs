//! Refresh trigger, single-analysis, and job inspection routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::server::state::{
    GuardedDispatcher, GuardedJobJournal, GuardedOrchestrator, ServerState,
};

#[derive(Debug, Deserialize)]
pub struct StaleQuery {
    /// Staleness threshold override, in hours.
    pub hours: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: usize,
}

pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/refresh/all", post(refresh_all))
        .route("/refresh/stale", post(refresh_stale))
        .route("/analyze/{code}", post(analyze_one))
        .route("/jobs", get(list_jobs))
}

/// POST /refresh/all - Enqueue an unpaced refresh of every stock.
///
/// Answers 202 with the enqueued count; job outcomes are visible only
/// through GET /jobs and the logs.
async fn refresh_all(State(orchestrator): State<GuardedOrchestrator>) -> impl IntoResponse {
    match orchestrator.refresh_all() {
        Ok(accepted) => {
            (StatusCode::ACCEPTED, Json(AcceptedResponse { accepted })).into_response()
        }
        Err(e) => {
            warn!("Failed to start full refresh: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to start refresh").into_response()
        }
    }
}

/// POST /refresh/stale?hours=N - Enqueue a paced refresh of stale stocks.
async fn refresh_stale(
    State(orchestrator): State<GuardedOrchestrator>,
    Query(query): Query<StaleQuery>,
) -> impl IntoResponse {
    let threshold = match query.hours {
        None => None,
        Some(hours) => match hours.checked_mul(3600) {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => {
                return (StatusCode::BAD_REQUEST, "hours out of range").into_response();
            }
        },
    };
    match orchestrator.refresh_stale(threshold) {
        Ok(accepted) => {
            (StatusCode::ACCEPTED, Json(AcceptedResponse { accepted })).into_response()
        }
        Err(e) => {
            warn!("Failed to start stale refresh: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to start refresh").into_response()
        }
    }
}

/// POST /analyze/{code} - Run one analysis and wait for it.
///
/// 200 with the analyzer's stdout, or 502 with its diagnostic text when
/// the analyzer itself fails.
async fn analyze_one(
    Path(code): Path<String>,
    State(dispatcher): State<GuardedDispatcher>,
) -> impl IntoResponse {
    match dispatcher.run_single(&code).await {
        Ok(stdout) => (StatusCode::OK, stdout).into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.diagnostic()).into_response(),
    }
}

/// GET /jobs - Snapshot of the job journal, oldest first.
async fn list_jobs(State(journal): State<GuardedJobJournal>) -> impl IntoResponse {
    Json(journal.snapshot())
}
