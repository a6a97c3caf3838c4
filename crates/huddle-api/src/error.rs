use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use huddle_db::StoreError;

/// API-level failure taxonomy. Everything here is recoverable for the
/// caller; the store guarantees no partial writes behind any of these.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("payload too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized => ApiError::Unauthorized,
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Validation(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(err) => {
                error!("internal error: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// spawn_blocking join failures are always internal.
pub(crate) fn join_error(err: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {err}"))
}
