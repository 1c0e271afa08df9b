//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to plain-text HTTP responses with appropriate status codes.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::snapshot::EngineError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// A request parameter could not be parsed
    #[error("BAD '{0}' parameter")]
    InvalidParameter(&'static str),

    /// Snapshot engine failure
    #[error("{0}")]
    Engine(#[from] EngineError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "INVALID_PARAMETER"),
            ApiError::Engine(EngineError::InvalidWindow(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_WINDOW")
            }
            ApiError::Engine(EngineError::Upstream { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();

        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Rejected request"
            );
        }

        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (header::HeaderName::from_static("x-request-id"), request_id),
            ],
            self.to_string(),
        )
            .into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::ArchiverError;
    use crate::snapshot::{UpstreamPhase, WindowError};

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::InvalidParameter("from").status().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EngineError::InvalidWindow(WindowError::NonPositiveLength(0)))
                .status()
                .0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EngineError::Upstream {
                phase: UpstreamPhase::Metadata,
                source: ArchiverError::Timeout,
            })
            .status()
            .0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ApiError::InvalidParameter("window").to_string(),
            "BAD 'window' parameter"
        );
        assert_eq!(
            ApiError::from(EngineError::Upstream {
                phase: UpstreamPhase::Statistics,
                source: ArchiverError::Timeout,
            })
            .to_string(),
            "archiver error (statistics): Request timeout"
        );
    }
}
