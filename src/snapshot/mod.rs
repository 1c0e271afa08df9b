//! Sensor Snapshot Engine
//!
//! This module answers "what did every tracked sensor read during this window":
//!
//! - **types**: Core data structures (WindowKey, StatSample, EntityRecord, Snapshot)
//! - **join**: Metadata grouping and statistics join
//! - **cache**: Window cache with admission and eviction policies
//! - **engine**: Query engine orchestrating cache and archiver
//! - **error**: Error types
//!
//! # Example
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
//!     let start = chrono::Utc::now() - chrono::Duration::hours(1);
//!     let snapshot = engine.get_snapshot(start, chrono::Duration::minutes(5)).await?;
//!
//!     println!("{} sensors", snapshot.data.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod join;
pub mod types;

pub use cache::{CacheConfig, StoreOutcome, WindowCache};
pub use engine::{EngineConfig, EngineStats, QueryEngine, DEFAULT_PATH_PATTERN};
pub use error::{EngineError, EngineResult, MalformedMetadataItem, UpstreamPhase, WindowError};
pub use join::{join_metadata, join_statistics, JoinReport, MetadataSchema};
pub use types::{EntityRecord, Quantity, QuantitySlot, Snapshot, StatSample, WindowKey};
