//! voxmap-le library interface
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod worker;

pub use crate::error::{ApiError, ApiResult, EngineError, EngineResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::cache::TtlCache;
use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;
use voxmap_common::events::EventBus;
use voxmap_common::params::PARAMS;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Short-TTL read cache for assembled landscapes
    pub landscape_cache: TtlCache<Uuid, models::LandscapeResult>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        let ttl = Duration::from_secs(*PARAMS.landscape_cache_ttl_secs.read().unwrap());
        Self {
            db,
            event_bus,
            landscape_cache: TtlCache::new(ttl),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::landscape_routes())
        .merge(api::vote_routes())
        .merge(api::statement_routes())
        .merge(api::ordering_routes())
        .merge(api::weight_routes())
        .merge(api::poll_config_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
}
