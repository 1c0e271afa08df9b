//! Snapshot Query Engine
//!
//! Orchestrates cache lookup, the two archiver queries and the join:
//!
//! ```text
//! get_snapshot(start, length)
//!   → WindowCache::get            (read lock)
//!   → MetadataResolver            (no lock held)
//!   → join_metadata
//!   → StatisticsResolver          (one batched query, no lock held)
//!   → join_statistics
//!   → WindowCache::store          (write lock: evict, then admit)
//! ```
//!
//! Concurrent misses for the same window are not deduplicated; both compute
//! the snapshot and the last store wins.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::archiver::{MetadataQuery, MetadataResolver, StatisticsQuery, StatisticsResolver};
use crate::watchdog::{UpstreamChannel, Watchdog, WatchdogConfig};

use super::cache::{CacheConfig, WindowCache};
use super::error::{EngineError, EngineResult, UpstreamPhase};
use super::join::{join_metadata, join_statistics, resolved_streams, MetadataSchema};
use super::types::{Quantity, Snapshot, WindowKey};

/// Path pattern of the tracked sensor streams
pub const DEFAULT_PATH_PATTERN: &str =
    "TwMwEkCRO-Cg3m1RBlgCQUeJPwRttSiLHppLhuHUDeU=/sensors/s.hamilton/.*/i.temperature/signal/operative";

/// Configuration for the query engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Attribute names read from the metadata bag
    pub schema: MetadataSchema,
    /// Archiver path pattern selecting the tracked sensors
    pub path_pattern: String,
    /// Cache policy
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema: MetadataSchema::default(),
            path_pattern: DEFAULT_PATH_PATTERN.to_string(),
            cache: CacheConfig::default(),
        }
    }
}

/// Counters exposed on the health endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub hits: u64,
    pub misses: u64,
    pub admitted: u64,
    pub cache_entries: usize,
}

/// Answers window queries, memoizing settled windows
pub struct QueryEngine {
    metadata: Arc<dyn MetadataResolver>,
    statistics: Arc<dyn StatisticsResolver>,
    cache: WindowCache,
    watchdog: Arc<Watchdog>,
    config: EngineConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    admitted: AtomicU64,
}

impl QueryEngine {
    /// Create an engine with a log-only watchdog
    pub fn new(
        metadata: Arc<dyn MetadataResolver>,
        statistics: Arc<dyn StatisticsResolver>,
        config: EngineConfig,
    ) -> Self {
        Self {
            metadata,
            statistics,
            cache: WindowCache::new(config.cache.clone()),
            watchdog: Arc::new(Watchdog::log_only(WatchdogConfig::default())),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
        }
    }

    /// Builder method: report upstream health to a watchdog
    pub fn with_watchdog(mut self, watchdog: Arc<Watchdog>) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &WindowCache {
        &self.cache
    }

    /// Current counters
    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            cache_entries: self.cache.len().await,
        }
    }

    /// The metadata selector issued on every miss
    pub fn metadata_query(&self) -> MetadataQuery {
        MetadataQuery::new(&self.config.schema.coordinate_attribute, &self.config.path_pattern)
    }

    /// Get the snapshot for a window, from cache or the archiver
    pub async fn get_snapshot(
        &self,
        window_start: DateTime<Utc>,
        window_length: Duration,
    ) -> EngineResult<Arc<Snapshot>> {
        let key = WindowKey::new(window_start, window_length)?;
        self.get_snapshot_for(key).await
    }

    /// Get the snapshot for an already validated window
    pub async fn get_snapshot_for(&self, key: WindowKey) -> EngineResult<Arc<Snapshot>> {
        if let Some(snapshot) = self.cache.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(window = %key, "Snapshot cache hit");
            return Ok(snapshot);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let snapshot = Arc::new(self.build_snapshot(key).await?);

        let outcome = self.cache.store(key, Arc::clone(&snapshot), Utc::now()).await;
        if outcome.admitted {
            self.admitted.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(window = %key, "Snapshot cached");
        } else {
            tracing::debug!(window = %key, "Snapshot not cached, window too recent");
        }

        Ok(snapshot)
    }

    /// Query the archiver and join the results
    async fn build_snapshot(&self, key: WindowKey) -> EngineResult<Snapshot> {
        let metadata = self
            .metadata
            .resolve_entities(&self.metadata_query())
            .await
            .map_err(|source| {
                tracing::error!(error = %source, "Metadata query failed");
                EngineError::Upstream {
                    phase: UpstreamPhase::Metadata,
                    source,
                }
            })?;
        tracing::info!(results = metadata.len(), "Metadata query returned");
        self.watchdog
            .report_upstream(UpstreamChannel::Metadata, metadata.len());

        let (mut entities, mut report) = join_metadata(&metadata, &self.config.schema);

        let query = StatisticsQuery::new(resolved_streams(&entities), key.start_ns(), key.length_ns());
        let stats = self
            .statistics
            .resolve_statistics(&query)
            .await
            .map_err(|source| {
                tracing::error!(error = %source, "Statistics query failed");
                EngineError::Upstream {
                    phase: UpstreamPhase::Statistics,
                    source,
                }
            })?;
        tracing::info!(streams = stats.len(), "Statistics query returned");
        self.watchdog
            .report_upstream(UpstreamChannel::Statistics, stats.len());

        join_statistics(&mut entities, &stats, &mut report);

        tracing::info!(
            window = %key,
            entities = entities.len(),
            skipped = report.skipped,
            temperature = report.samples_for(Quantity::Temperature),
            humidity = report.samples_for(Quantity::Humidity),
            "Snapshot built"
        );

        Ok(Snapshot::new(key, entities))
    }
}
