//! Vote recording endpoint
//!
//! POST /votes is the hot path: record, emit, evaluate the clustering
//! trigger, return. The response says whether the vote was new (duplicates
//! are ignored, votes being immutable) and whether it queued a
//! recomputation.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use voxmap_common::events::VoxmapEvent;

use crate::error::{ApiError, ApiResult};
use crate::services::trigger::{self, TriggerDecision};
use crate::{db, AppState};

/// POST /votes request
#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub voter_id: Uuid,
    pub statement_id: Uuid,
    /// -1 disagree, 0 pass, 1 agree
    pub value: i32,
}

/// POST /votes response
#[derive(Debug, Serialize)]
pub struct CastVoteResponse {
    pub voter_id: Uuid,
    pub statement_id: Uuid,
    /// False when the (voter, statement) pair had already voted
    pub recorded: bool,
    /// True when this vote queued a background recomputation
    pub clustering_queued: bool,
}

/// POST /votes
pub async fn cast_vote(
    State(state): State<AppState>,
    Json(request): Json<CastVoteRequest>,
) -> ApiResult<(StatusCode, Json<CastVoteResponse>)> {
    if !(-1..=1).contains(&request.value) {
        return Err(ApiError::BadRequest(format!(
            "Vote value must be -1, 0, or 1, got {}",
            request.value
        )));
    }

    let poll_id = db::statements::poll_for_statement(&state.db, request.statement_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Statement not found: {}", request.statement_id))
        })?;

    let recorded =
        db::votes::record_vote(&state.db, request.voter_id, request.statement_id, request.value)
            .await?;

    let mut clustering_queued = false;
    if recorded {
        state.event_bus.emit_lossy(VoxmapEvent::VoteRecorded {
            poll_id,
            voter_id: request.voter_id,
            statement_id: request.statement_id,
            value: request.value,
            timestamp: chrono::Utc::now(),
        });

        let decision =
            trigger::evaluate_after_vote(&state.db, &state.event_bus, poll_id, request.voter_id)
                .await?;
        clustering_queued = matches!(decision, TriggerDecision::Queued(_));
    }

    // 201 even for ignored duplicates: the vote exists either way
    Ok((
        StatusCode::CREATED,
        Json(CastVoteResponse {
            voter_id: request.voter_id,
            statement_id: request.statement_id,
            recorded,
            clustering_queued,
        }),
    ))
}

/// Build vote routes
pub fn vote_routes() -> Router<AppState> {
    Router::new().route("/votes", post(cast_vote))
}
