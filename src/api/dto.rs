//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};

// ============================================
// DATA DTOs
// ============================================

/// Query parameters of `GET /data`
///
/// Kept as raw strings so a malformed value can be reported by name.
#[derive(Debug, Default, Deserialize)]
pub struct DataParams {
    /// Window start, seconds since the Unix epoch (default: 10 minutes ago)
    #[serde(default)]
    pub from: Option<String>,
    /// Window length in seconds (default: 300)
    #[serde(default)]
    pub window: Option<String>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: healthy
    pub status: String,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
    /// Snapshot cache counters
    pub cache: CacheStatsDto,
}

/// Snapshot cache counters
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheStatsDto {
    /// Cached windows
    pub entries: usize,
    /// Requests answered from cache
    pub hits: u64,
    /// Requests that queried the archiver
    pub misses: u64,
    /// Snapshots admitted into the cache
    pub admitted: u64,
}
