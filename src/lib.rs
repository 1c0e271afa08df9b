//! # Sensorstate
//!
//! Windowed sensor snapshot service. Answers "what were the sensor readings
//! during this window" by joining archiver metadata (sensor coordinates and
//! stream identifiers) with windowed statistics (min/mean/max/count), and
//! memoizes the result per window.
//!
//! ## Modules
//!
//! - [`snapshot`]: Data model, metadata/statistics join, window cache, query engine
//! - [`archiver`]: Resolver traits and the archiver HTTP client
//! - [`watchdog`]: Liveness and upstream health signalling
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensorstate::archiver::{ArchiverConfig, HttpArchiver};
//! use sensorstate::snapshot::{EngineConfig, QueryEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let archiver = Arc::new(HttpArchiver::new(ArchiverConfig::default())?);
//!     let engine = QueryEngine::new(archiver.clone(), archiver, EngineConfig::default());
//!
//!     // Five minutes, one hour ago
//!     let start = chrono::Utc::now() - chrono::Duration::hours(1);
//!     let snapshot = engine.get_snapshot(start, chrono::Duration::minutes(5)).await?;
//!
//!     println!("{}", String::from_utf8(snapshot.to_json_pretty()?)?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod archiver;
pub mod config;
pub mod snapshot;
pub mod watchdog;

// Re-export top-level types for convenience
pub use snapshot::{
    EngineConfig, EngineError, EntityRecord, Quantity, QueryEngine, Snapshot, StatSample,
    WindowCache, WindowKey,
};

pub use archiver::{
    ArchiverConfig, ArchiverError, HttpArchiver, MetadataItem, MetadataResolver, StatisticsItem,
    StatisticsResolver,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};

pub use watchdog::{Watchdog, WatchdogConfig, WatchdogSink};
