use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::api::format::RenderError;
use crate::engine::types::ResolveError;

/// Error returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad_request: {0}")]
    BadRequest(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("upstream_error: {0}")]
    Upstream(String),
    #[error("internal_error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Upstream(msg) => {
                error!(error = %msg, "provider failure");
                (StatusCode::BAD_GATEWAY, msg)
            }
            Self::Internal(msg) => {
                error!(error = %msg, "internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::UnavailableTime { .. } => {
                Self::NotFound("No data available for the specified time.".to_string())
            }
            ResolveError::Provider(e) => Self::Upstream(e.to_string()),
            ResolveError::Store(e) => Self::Internal(e.to_string()),
            ResolveError::Aborted(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(e: RenderError) -> Self {
        Self::Internal(e.to_string())
    }
}
