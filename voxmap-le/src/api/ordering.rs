//! Statement ordering endpoint
//!
//! POST /polls/:poll_id/order resolves the next batch of unvoted statements
//! for one voter, ordered by the poll's configured strategy.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::services::ordering;
use crate::AppState;

/// POST /polls/:poll_id/order request
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub voter_id: Uuid,
}

/// POST /polls/:poll_id/order response
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub poll_id: Uuid,
    pub voter_id: Uuid,
    /// Next batch of statement ids in presentation order; empty when the
    /// voter has voted on everything
    pub statement_ids: Vec<Uuid>,
}

/// POST /polls/:poll_id/order
pub async fn order_statements(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Json(request): Json<OrderRequest>,
) -> ApiResult<Json<OrderResponse>> {
    let statement_ids = ordering::next_batch(&state.db, poll_id, request.voter_id).await?;

    Ok(Json(OrderResponse {
        poll_id,
        voter_id: request.voter_id,
        statement_ids,
    }))
}

/// Build ordering routes
pub fn ordering_routes() -> Router<AppState> {
    Router::new().route("/polls/:poll_id/order", post(order_statements))
}
