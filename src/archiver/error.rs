//! Archiver error types

use thiserror::Error;

/// Errors that can occur when querying the archiver
#[derive(Error, Debug)]
pub enum ArchiverError {
    #[error("Archiver unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Query rejected: {0}")]
    Query(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid query window: {0}")]
    InvalidWindow(String),
}

impl ArchiverError {
    /// Classify a transport-level reqwest failure
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ArchiverError::Timeout
        } else if e.is_connect() {
            ArchiverError::Unavailable
        } else {
            ArchiverError::Request(e)
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ArchiverError::Unavailable | ArchiverError::Timeout)
    }
}
