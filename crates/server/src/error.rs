//! Errors raised by the edge host before a request reaches the layer.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::offline::ErrorEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The request target could not be turned into an absolute http(s) URL.
    #[error("INVALID_TARGET: {0}")]
    InvalidTarget(String),

    /// The request body exceeded the configured limit.
    #[error("BODY_TOO_LARGE: request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("STATUS_UNAVAILABLE: {0}")]
    Status(#[from] fieldcache_core::Error),
}

impl HostError {
    fn status_code(&self) -> StatusCode {
        match self {
            HostError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            HostError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            HostError::Status(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        (self.status_code(), Json(ErrorEnvelope { error: &message, offline: None })).into_response()
    }
}
