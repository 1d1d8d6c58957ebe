//! Landscape API handlers
//!
//! GET /polls/:poll_id/eligibility, POST /polls/:poll_id/landscape/compute,
//! GET /polls/:poll_id/landscape, GET /polls/:poll_id/landscape/status
//!
//! Compute never runs inline: the POST enqueues a background job and returns
//! 202 Accepted immediately. Reads go through a short-lived TTL cache so a
//! burst of map viewers doesn't hammer the three landscape tables.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::quality::{check_eligibility, Eligibility};
use crate::error::{ApiError, ApiResult};
use crate::models::LandscapeResult;
use crate::{db, AppState};

/// POST /polls/:poll_id/landscape/compute response
#[derive(Debug, Serialize)]
pub struct ComputeResponse {
    pub poll_id: Uuid,
    /// "queued" when a new job was created, "already_queued" otherwise
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

/// GET /polls/:poll_id/landscape/status response entry
#[derive(Debug, Serialize)]
pub struct JobStatusEntry {
    pub status: String,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /polls/:poll_id/eligibility
///
/// Cheap count-only check; always 200, the body says whether clustering
/// would run and why not if it wouldn't.
pub async fn get_eligibility(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> ApiResult<Json<Eligibility>> {
    let eligibility = check_eligibility(&state.db, poll_id).await?;
    Ok(Json(eligibility))
}

/// POST /polls/:poll_id/landscape/compute
///
/// Manual recomputation trigger (admin surface). Rejects ineligible polls
/// with 422 instead of queueing a job doomed to no-op.
pub async fn request_compute(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ComputeResponse>)> {
    let eligibility = check_eligibility(&state.db, poll_id).await?;
    if !eligibility.eligible {
        return Err(ApiError::InsufficientData(
            eligibility.reason.unwrap_or_else(|| "Poll not eligible".to_string()),
        ));
    }

    let job_id = db::jobs::enqueue(&state.db, poll_id).await?;
    let status = if job_id.is_some() {
        "queued"
    } else {
        "already_queued"
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(ComputeResponse {
            poll_id,
            status: status.to_string(),
            job_id,
        }),
    ))
}

/// GET /polls/:poll_id/landscape
///
/// Latest persisted landscape, 404 if none has been computed yet.
pub async fn get_landscape(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> ApiResult<Json<LandscapeResult>> {
    if let Some(cached) = state.landscape_cache.get(&poll_id).await {
        return Ok(Json(cached));
    }

    let landscape = db::landscape::get_landscape(&state.db, poll_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No landscape computed for poll {}", poll_id))
        })?;

    state.landscape_cache.insert(poll_id, landscape.clone()).await;
    Ok(Json(landscape))
}

/// GET /polls/:poll_id/landscape/status
///
/// Job history for the poll, newest first. Diagnostic surface for operators
/// watching a recomputation.
pub async fn get_compute_status(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> ApiResult<Json<Vec<JobStatusEntry>>> {
    let jobs = db::jobs::poll_status(&state.db, poll_id).await?;
    Ok(Json(
        jobs.into_iter()
            .map(|(status, attempts, last_error)| JobStatusEntry {
                status,
                attempts,
                last_error,
            })
            .collect(),
    ))
}

/// Build landscape routes
pub fn landscape_routes() -> Router<AppState> {
    Router::new()
        .route("/polls/:poll_id/eligibility", get(get_eligibility))
        .route("/polls/:poll_id/landscape/compute", post(request_compute))
        .route("/polls/:poll_id/landscape", get(get_landscape))
        .route("/polls/:poll_id/landscape/status", get(get_compute_status))
}
