//! Poll configuration endpoints
//!
//! GET and PUT of the per-poll presentation settings (ordering strategy,
//! batch size, seed override). A poll with no row reads back the defaults.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{OrderingStrategy, PollConfig};
use crate::{db, AppState};

/// PUT /polls/:poll_id/config request
#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    pub ordering_strategy: String,
    pub batch_size: usize,
    #[serde(default)]
    pub seed_override: Option<i64>,
}

/// GET /polls/:poll_id/config
pub async fn get_config(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> ApiResult<Json<PollConfig>> {
    let config = db::polls::get_poll_config(&state.db, poll_id).await?;
    Ok(Json(config))
}

/// PUT /polls/:poll_id/config
pub async fn set_config(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Json(request): Json<SetConfigRequest>,
) -> ApiResult<Json<PollConfig>> {
    let strategy = OrderingStrategy::parse(&request.ordering_strategy).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Unknown ordering strategy: {}",
            request.ordering_strategy
        ))
    })?;
    if request.batch_size == 0 {
        return Err(ApiError::BadRequest("Batch size must be positive".to_string()));
    }

    let config = PollConfig {
        poll_id,
        ordering_strategy: strategy,
        batch_size: request.batch_size,
        seed_override: request.seed_override,
    };
    db::polls::set_poll_config(&state.db, &config).await?;

    Ok(Json(config))
}

/// Build poll configuration routes
pub fn poll_config_routes() -> Router<AppState> {
    Router::new().route("/polls/:poll_id/config", get(get_config).put(set_config))
}
