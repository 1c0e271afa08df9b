//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{CacheStatsDto, HealthResponse};
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness probe. The engine holds no connections of its own,
/// so the service is ready as soon as it is listening.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
///
/// Full health status with cache counters.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = state.engine.stats().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: CacheStatsDto {
            entries: stats.cache_entries,
            hits: stats.hits,
            misses: stats.misses,
            admitted: stats.admitted,
        },
    })
}
