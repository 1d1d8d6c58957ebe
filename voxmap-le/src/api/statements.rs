//! Statement submission and moderation endpoints
//!
//! Statements enter unapproved and only count toward eligibility, matrices
//! and ordering once approved.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::{db, AppState};

/// POST /polls/:poll_id/statements request
#[derive(Debug, Deserialize)]
pub struct SubmitStatementRequest {
    pub text: String,
    /// Admin-submitted statements can skip moderation
    #[serde(default)]
    pub approved: bool,
}

/// POST /polls/:poll_id/statements response
#[derive(Debug, Serialize)]
pub struct SubmitStatementResponse {
    pub statement_id: Uuid,
    pub poll_id: Uuid,
    pub approved: bool,
}

/// POST /polls/:poll_id/statements/:statement_id/approve response
#[derive(Debug, Serialize)]
pub struct ApproveStatementResponse {
    pub statement_id: Uuid,
    pub approved: bool,
}

/// POST /polls/:poll_id/statements
pub async fn submit_statement(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Json(request): Json<SubmitStatementRequest>,
) -> ApiResult<(StatusCode, Json<SubmitStatementResponse>)> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Statement text is empty".to_string()));
    }

    let statement_id = Uuid::new_v4();
    db::statements::insert_statement(
        &state.db,
        statement_id,
        poll_id,
        text,
        request.approved,
        chrono::Utc::now(),
    )
    .await?;

    tracing::info!(
        statement_id = %statement_id,
        poll_id = %poll_id,
        approved = request.approved,
        "Statement submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitStatementResponse {
            statement_id,
            poll_id,
            approved: request.approved,
        }),
    ))
}

/// POST /polls/:poll_id/statements/:statement_id/approve
///
/// Idempotent: approving an already-approved statement is a no-op success.
pub async fn approve_statement(
    State(state): State<AppState>,
    Path((poll_id, statement_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ApproveStatementResponse>> {
    let owner = db::statements::poll_for_statement(&state.db, statement_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Statement not found: {}", statement_id)))?;
    if owner != poll_id {
        return Err(ApiError::BadRequest(format!(
            "Statement {} does not belong to poll {}",
            statement_id, poll_id
        )));
    }

    db::statements::approve_statement(&state.db, statement_id).await?;

    // A new approved statement shifts the poll's age distribution, so every
    // cached weight is recomputed on next read
    crate::services::weighting::invalidate_weights(&state.db, &state.event_bus, poll_id).await?;

    Ok(Json(ApproveStatementResponse {
        statement_id,
        approved: true,
    }))
}

/// Build statement routes
pub fn statement_routes() -> Router<AppState> {
    Router::new()
        .route("/polls/:poll_id/statements", post(submit_statement))
        .route(
            "/polls/:poll_id/statements/:statement_id/approve",
            post(approve_statement),
        )
}
