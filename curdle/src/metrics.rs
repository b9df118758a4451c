//! Cache telemetry.
//!
//! Providers record hits, misses, loads, expirations, evictions and
//! invalidations through lock-free atomic counters, and expose a
//! point-in-time [`CacheStatsSnapshot`] for display or serialization.
//! Counters are advisory instrumentation; they never participate in cache
//! correctness.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters updated by a provider on every cache operation.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheMetrics {
    /// Create a zeroed metrics set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit.
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss.
    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a loader invocation.
    pub fn load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` entries removed because their TTL lapsed.
    pub fn expired(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    /// Record `count` entries dropped by the capacity bound.
    pub fn evicted(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Record an explicit invalidation.
    pub fn invalidated(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters.
    pub fn snapshot(&self, provider: &str) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            provider: provider.to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsSnapshot {
    /// Name of the provider that produced the snapshot.
    pub provider: String,
    /// Reads answered from a live entry.
    pub hits: u64,
    /// Reads that found no usable entry.
    pub misses: u64,
    /// Loader invocations.
    pub loads: u64,
    /// Entries removed because their TTL lapsed.
    pub expirations: u64,
    /// Entries dropped by the capacity bound.
    pub evictions: u64,
    /// Explicit invalidations.
    pub invalidations: u64,
}

impl CacheStatsSnapshot {
    /// Hit ratio over all reads, `0.0` when nothing was read yet.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = CacheMetrics::new();
        metrics.hit();
        metrics.hit();
        metrics.miss();
        metrics.load();
        metrics.expired(3);
        metrics.evicted(2);
        metrics.invalidated();

        let snapshot = metrics.snapshot("TestProvider");
        assert_eq!(snapshot.provider, "TestProvider");
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.loads, 1);
        assert_eq!(snapshot.expirations, 3);
        assert_eq!(snapshot.evictions, 2);
        assert_eq!(snapshot.invalidations, 1);
    }

    #[test]
    fn test_hit_ratio() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.snapshot("p").hit_ratio(), 0.0);

        metrics.hit();
        metrics.hit();
        metrics.hit();
        metrics.miss();
        let ratio = metrics.snapshot("p").hit_ratio();
        assert!((ratio - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = CacheMetrics::new();
        metrics.hit();
        let json = serde_json::to_string(&metrics.snapshot("p")).unwrap();
        assert!(json.contains("\"hits\":1"));
    }
}
