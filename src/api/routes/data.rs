//! Data Routes
//!
//! Snapshot endpoint.
//!
//! - GET /data?from=<unix seconds>&window=<seconds>

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::api::dto::DataParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// Window start when `from` is omitted, relative to now
const DEFAULT_LOOKBACK_SECS: i64 = 10 * 60;

/// Window length when `window` is omitted
const DEFAULT_WINDOW_SECS: i64 = 300;

/// GET /data
///
/// Return the sensor snapshot for the requested window as indented JSON.
pub async fn get_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataParams>,
) -> ApiResult<Response> {
    let (start, length) = parse_window(&params, Utc::now())?;

    let snapshot = state.engine.get_snapshot(start, length).await?;

    let body = snapshot
        .to_json_pretty()
        .map_err(|e| ApiError::Internal(format!("Failed to encode snapshot: {}", e)))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// Resolve the request window, applying defaults for missing parameters
pub fn parse_window(
    params: &DataParams,
    now: DateTime<Utc>,
) -> ApiResult<(DateTime<Utc>, Duration)> {
    let from = match non_empty(&params.from) {
        Some(value) => value
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(ApiError::InvalidParameter("from"))?,
        // Whole seconds, so repeated default requests within a second share a key
        None => DateTime::from_timestamp(now.timestamp() - DEFAULT_LOOKBACK_SECS, 0)
            .ok_or(ApiError::InvalidParameter("from"))?,
    };

    let window_secs = match non_empty(&params.window) {
        Some(value) => value
            .parse::<i64>()
            .map_err(|_| ApiError::InvalidParameter("window"))?,
        None => DEFAULT_WINDOW_SECS,
    };
    if window_secs <= 0 {
        return Err(ApiError::InvalidParameter("window"));
    }
    let window = Duration::try_seconds(window_secs).ok_or(ApiError::InvalidParameter("window"))?;

    Ok((from, window))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params(from: Option<&str>, window: Option<&str>) -> DataParams {
        DataParams {
            from: from.map(String::from),
            window: window.map(String::from),
        }
    }

    #[test]
    fn test_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let (start, length) = parse_window(&params(None, Some("")), now).unwrap();

        assert_eq!(start, now - Duration::minutes(10));
        assert_eq!(length, Duration::seconds(300));
    }

    #[test]
    fn test_explicit_window() {
        let now = Utc::now();
        let (start, length) = parse_window(&params(Some("1714564800"), Some("60")), now).unwrap();

        assert_eq!(start.timestamp(), 1_714_564_800);
        assert_eq!(length, Duration::seconds(60));
    }

    #[test]
    fn test_bad_parameters() {
        let now = Utc::now();

        let err = parse_window(&params(Some("yesterday"), None), now).unwrap_err();
        assert_eq!(err.to_string(), "BAD 'from' parameter");

        let err = parse_window(&params(None, Some("5m")), now).unwrap_err();
        assert_eq!(err.to_string(), "BAD 'window' parameter");

        let err = parse_window(&params(None, Some("0")), now).unwrap_err();
        assert_eq!(err.to_string(), "BAD 'window' parameter");

        let err = parse_window(&params(Some("99999999999999999"), None), now).unwrap_err();
        assert_eq!(err.to_string(), "BAD 'from' parameter");
    }
}
