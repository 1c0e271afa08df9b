//! Snapshot engine error types
//!
//! Whole-query failures (`EngineError`) abort a snapshot request. Per-item
//! metadata failures (`MalformedMetadataItem`) are absorbed by the join and
//! only logged.

use thiserror::Error;

use crate::archiver::ArchiverError;

/// Invalid request window
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// Length must be strictly positive
    #[error("window length must be positive, got {0}ns")]
    NonPositiveLength(i64),

    /// Start or end does not fit in i64 nanoseconds since the epoch
    #[error("window out of representable range: {0}")]
    OutOfRange(String),
}

/// Which upstream query failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamPhase {
    Metadata,
    Statistics,
}

impl std::fmt::Display for UpstreamPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamPhase::Metadata => write!(f, "metadata"),
            UpstreamPhase::Statistics => write!(f, "statistics"),
        }
    }
}

/// Errors that abort a snapshot request
#[derive(Error, Debug)]
pub enum EngineError {
    /// Requested window is not valid
    #[error("Invalid window: {0}")]
    InvalidWindow(#[from] WindowError),

    /// The archiver failed one of the two queries
    #[error("archiver error ({phase}): {source}")]
    Upstream {
        phase: UpstreamPhase,
        #[source]
        source: ArchiverError,
    },
}

/// A metadata item that cannot contribute to a snapshot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedMetadataItem {
    #[error("stream {stream_id}: missing attribute {attribute}")]
    MissingAttribute { stream_id: String, attribute: String },

    #[error("stream {stream_id}: attribute {attribute} is not a string")]
    WrongAttributeType { stream_id: String, attribute: String },

    #[error("stream {stream_id}: bad coordinates {value:?}")]
    BadCoordinates { stream_id: String, value: String },

    #[error("stream {stream_id}: bad path {path:?} (expected {expected} segments)")]
    BadPath {
        stream_id: String,
        path: String,
        expected: usize,
    },
}

/// Result type for snapshot engine operations
pub type EngineResult<T> = Result<T, EngineError>;
