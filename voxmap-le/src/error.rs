//! Error types for voxmap-le
//!
//! Two layers: `EngineError` is the clustering-pipeline taxonomy (insufficient
//! data is expected and user-displayable; numerical and persistence failures
//! are fatal to one attempt and retried by the job runner), and `ApiError`
//! maps everything onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Clustering pipeline errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Poll is below the hard eligibility floor. Expected, not a bug;
    /// `reason` is user-displayable ("Insufficient users: 19/20").
    #[error("{reason}")]
    InsufficientData {
        reason: String,
        voter_count: usize,
        statement_count: usize,
    },

    /// PCA/k-means produced degenerate output (NaN centroids, empty basis).
    /// Fatal to this computation attempt; no partial write.
    #[error("Numerical failure: {0}")]
    Numerical(String),

    /// Landscape transaction could not commit. Fatal, no partial write,
    /// safe to retry the whole computation.
    #[error("Persistence failure: {0}")]
    Persistence(sqlx::Error),

    /// Other database error outside the landscape transaction
    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether the background job runner should retry this failure
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::InsufficientData { .. } => false,
            EngineError::Numerical(_) => true,
            EngineError::Persistence(_) => true,
            EngineError::Database(_) => true,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Poll below the clustering eligibility floor (422)
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// voxmap-common error
    #[error("Common error: {0}")]
    Common(#[from] voxmap_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::InsufficientData(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INSUFFICIENT_DATA",
                msg,
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Engine(EngineError::InsufficientData { ref reason, .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INSUFFICIENT_DATA",
                reason.clone(),
            ),
            ApiError::Engine(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ENGINE_ERROR",
                err.to_string(),
            ),
            ApiError::Database(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
