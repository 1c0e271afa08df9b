//! Window Cache
//!
//! In-memory map from a requested window to its computed snapshot.
//!
//! # Policies
//!
//! - **Admission**: a snapshot is stored only once its window is settled,
//!   i.e. it ended at least `settle_guard` before now. Recent windows may still
//!   receive late data and are recomputed on every request.
//! - **Eviction**: when a new window is about to be inserted into a full
//!   cache, a batch of entries is dropped in hash-map iteration order. This is
//!   a coarse size bound, not LRU. Rejected snapshots and overwrites of an
//!   existing key never evict.
//!
//! Lookups take the read lock; eviction and insertion happen together under
//! one write lock.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{Snapshot, WindowKey};

/// Configuration for the window cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached windows
    pub max_entries: usize,
    /// Entries dropped at once when the cache is full
    pub eviction_batch: usize,
    /// How long after a window ends before it may be cached
    pub settle_guard: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            eviction_batch: 50,
            settle_guard: Duration::minutes(3),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum entries
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the eviction batch size
    pub fn with_eviction_batch(mut self, batch: usize) -> Self {
        self.eviction_batch = batch;
        self
    }

    /// Set the settle guard
    pub fn with_settle_guard(mut self, guard: Duration) -> Self {
        self.settle_guard = guard;
        self
    }
}

/// Outcome of offering a snapshot to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOutcome {
    /// Whether the snapshot was inserted
    pub admitted: bool,
    /// Entries evicted to make room
    pub evicted: usize,
}

/// Cache of computed snapshots keyed by window
pub struct WindowCache {
    entries: RwLock<HashMap<WindowKey, Arc<Snapshot>>>,
    config: CacheConfig,
}

impl WindowCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a previously stored snapshot
    pub async fn get(&self, key: &WindowKey) -> Option<Arc<Snapshot>> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    /// Number of cached windows
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether a window ended long enough before `now` to be cached
    ///
    /// A guard reaching before the representable range settles nothing.
    pub fn is_settled(&self, key: &WindowKey, now: DateTime<Utc>) -> bool {
        now.checked_sub_signed(self.config.settle_guard)
            .is_some_and(|cutoff| key.end() <= cutoff)
    }

    /// Insert the snapshot if its window is settled, evicting first when a
    /// new key would overflow the cache
    pub async fn store(
        &self,
        key: WindowKey,
        snapshot: Arc<Snapshot>,
        now: DateTime<Utc>,
    ) -> StoreOutcome {
        let admitted = self.is_settled(&key, now);

        if !admitted {
            return StoreOutcome {
                admitted,
                evicted: 0,
            };
        }

        let mut entries = self.entries.write().await;
        let evicted = if entries.contains_key(&key) {
            0
        } else {
            self.evict_locked(&mut entries)
        };
        entries.insert(key, snapshot);

        StoreOutcome { admitted, evicted }
    }

    /// Drop every cached entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Remove a batch of arbitrary entries once the cache is full
    fn evict_locked(&self, entries: &mut HashMap<WindowKey, Arc<Snapshot>>) -> usize {
        if entries.len() < self.config.max_entries {
            return 0;
        }

        // Always drop enough to make room for one insertion.
        let overflow = entries.len() + 1 - self.config.max_entries;
        let batch = self.config.eviction_batch.max(overflow);
        let victims: Vec<WindowKey> = entries.keys().take(batch).copied().collect();
        for key in &victims {
            entries.remove(key);
        }

        tracing::info!(evicted = victims.len(), remaining = entries.len(), "Evicted cached windows");
        victims.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const SECOND: i64 = 1_000_000_000;

    fn snapshot(key: WindowKey) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(key, BTreeMap::new()))
    }

    fn settled_key(now: DateTime<Utc>, offset: i64) -> WindowKey {
        let start = now.timestamp_nanos_opt().unwrap() - 3600 * SECOND + offset * SECOND;
        WindowKey::from_nanos(start, 60 * SECOND).unwrap()
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let cache = WindowCache::new(CacheConfig::default());
        let now = Utc::now();
        let key = settled_key(now, 0);

        assert!(cache.get(&key).await.is_none());

        let snap = snapshot(key);
        let outcome = cache.store(key, Arc::clone(&snap), now).await;
        assert_eq!(outcome, StoreOutcome { admitted: true, evicted: 0 });

        let cached = cache.get(&key).await.unwrap();
        assert!(Arc::ptr_eq(&cached, &snap));
    }

    #[tokio::test]
    async fn test_admission_guard() {
        let cache = WindowCache::new(CacheConfig::default());
        let now = Utc::now();
        let now_ns = now.timestamp_nanos_opt().unwrap();
        let length = 300 * SECOND;

        // Ends two minutes ago: not settled.
        let recent = WindowKey::from_nanos(now_ns - 120 * SECOND - length, length).unwrap();
        assert!(!cache.is_settled(&recent, now));
        assert!(!cache.store(recent, snapshot(recent), now).await.admitted);
        assert!(cache.get(&recent).await.is_none());

        // Ends four minutes ago: settled.
        let older = WindowKey::from_nanos(now_ns - 240 * SECOND - length, length).unwrap();
        assert!(cache.is_settled(&older, now));
        assert!(cache.store(older, snapshot(older), now).await.admitted);
        assert!(cache.get(&older).await.is_some());

        // Ends exactly at the guard: settled.
        let edge = WindowKey::from_nanos(now_ns - 180 * SECOND - length, length).unwrap();
        assert!(cache.is_settled(&edge, now));
    }

    #[tokio::test]
    async fn test_eviction_bound() {
        let cache = WindowCache::new(CacheConfig::default());
        let now = Utc::now();

        for i in 0..1001 {
            let key = settled_key(now, i);
            cache.store(key, snapshot(key), now).await;
            assert!(cache.len().await <= 1000);
        }

        // 1000 entries, 50 evicted, then the 1001st inserted
        assert_eq!(cache.len().await, 951);
        assert!(cache.get(&settled_key(now, 1000)).await.is_some());
    }

    #[tokio::test]
    async fn test_full_cache_keeps_entries_for_rejected_snapshot() {
        let config = CacheConfig::new().with_max_entries(4).with_eviction_batch(2);
        let cache = WindowCache::new(config);
        let now = Utc::now();

        for i in 0..4 {
            let key = settled_key(now, i);
            cache.store(key, snapshot(key), now).await;
        }
        assert_eq!(cache.len().await, 4);

        let recent = WindowKey::from_nanos(now.timestamp_nanos_opt().unwrap(), SECOND).unwrap();
        let outcome = cache.store(recent, snapshot(recent), now).await;
        assert_eq!(outcome, StoreOutcome { admitted: false, evicted: 0 });
        assert_eq!(cache.len().await, 4);
    }

    #[tokio::test]
    async fn test_full_cache_overwrite_does_not_evict() {
        let config = CacheConfig::new().with_max_entries(4).with_eviction_batch(2);
        let cache = WindowCache::new(config);
        let now = Utc::now();

        for i in 0..4 {
            let key = settled_key(now, i);
            cache.store(key, snapshot(key), now).await;
        }

        // Second store of the same window, as after two concurrent misses
        let key = settled_key(now, 2);
        let replacement = snapshot(key);
        let outcome = cache.store(key, Arc::clone(&replacement), now).await;

        assert_eq!(outcome, StoreOutcome { admitted: true, evicted: 0 });
        assert_eq!(cache.len().await, 4);
        assert!(Arc::ptr_eq(&cache.get(&key).await.unwrap(), &replacement));
    }

    #[tokio::test]
    async fn test_huge_settle_guard_caches_nothing() {
        let config = CacheConfig::new().with_settle_guard(Duration::seconds(10_i64.pow(13)));
        let cache = WindowCache::new(config);
        let now = Utc::now();
        let key = settled_key(now, 0);

        assert!(!cache.is_settled(&key, now));
        let outcome = cache.store(key, snapshot(key), now).await;
        assert_eq!(outcome, StoreOutcome { admitted: false, evicted: 0 });
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = WindowCache::new(CacheConfig::default());
        let now = Utc::now();
        let key = settled_key(now, 0);
        cache.store(key, snapshot(key), now).await;

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
