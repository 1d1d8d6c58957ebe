//! Statement weight endpoints
//!
//! GET /polls/:poll_id/weights exposes the weight components for inspection
//! (which mode is in effect, why a statement ranks where it does).
//! POST /polls/:poll_id/weights/invalidate clears the persisted cache so
//! the next ordering request recomputes from fresh landscape data.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::StatementWeight;
use crate::services::weighting;
use crate::{db, AppState};

/// GET /polls/:poll_id/weights query parameters
#[derive(Debug, Default, Deserialize)]
pub struct WeightsQuery {
    /// Optional comma-separated statement id filter; defaults to every
    /// approved statement in the poll
    pub statement_ids: Option<String>,
}

/// GET /polls/:poll_id/weights response
#[derive(Debug, Serialize)]
pub struct WeightsResponse {
    pub poll_id: Uuid,
    pub weights: Vec<StatementWeight>,
}

/// POST /polls/:poll_id/weights/invalidate response
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub poll_id: Uuid,
    /// Cached weight rows dropped
    pub invalidated: u64,
}

/// GET /polls/:poll_id/weights
pub async fn get_weights(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Query(query): Query<WeightsQuery>,
) -> ApiResult<Json<WeightsResponse>> {
    let statement_ids = match query.statement_ids {
        Some(raw) => raw
            .split(',')
            .map(|s| {
                Uuid::parse_str(s.trim()).map_err(|_| {
                    crate::error::ApiError::BadRequest(format!("Invalid statement id: {}", s))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => {
            let statements = db::statements::list_approved_statements(&state.db, poll_id).await?;
            statements.iter().map(|s| s.id).collect()
        }
    };
    let weights = weighting::get_statement_weights(&state.db, poll_id, &statement_ids).await?;

    Ok(Json(WeightsResponse { poll_id, weights }))
}

/// POST /polls/:poll_id/weights/invalidate
pub async fn invalidate_weights(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> ApiResult<Json<InvalidateResponse>> {
    let invalidated = weighting::invalidate_weights(&state.db, &state.event_bus, poll_id).await?;

    Ok(Json(InvalidateResponse {
        poll_id,
        invalidated,
    }))
}

/// Build weight routes
pub fn weight_routes() -> Router<AppState> {
    Router::new()
        .route("/polls/:poll_id/weights", get(get_weights))
        .route("/polls/:poll_id/weights/invalidate", post(invalidate_weights))
}
