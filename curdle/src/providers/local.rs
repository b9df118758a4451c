//! The default in-process provider.
//!
//! `LocalMapCacheProvider` keeps named stores in a concurrent map and runs
//! the canonical single-flight load protocol: the first caller to observe a
//! miss acquires the entry's load lock, invokes the loader, and publishes
//! value and expiry together; concurrent callers for the same key wait on
//! the same lock, bounded by [`LOAD_LOCK_TIMEOUT`], and re-check the slot
//! once they acquire it so a completed load is never repeated.
//!
//! `put` takes the same load lock before replacing the slot, so an upsert
//! can never interleave with an in-flight load for the same key.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::key::CacheKey;
use crate::metrics::{CacheMetrics, CacheStatsSnapshot};
use crate::provider::{
    BoxFuture, CacheLoader, CacheProvider, CachedObject, LOAD_LOCK_TIMEOUT,
};
use crate::store::{CacheStore, Lookup, SlotValue};

/// Registry name of the default provider.
pub const LOCAL_PROVIDER_NAME: &str = "LocalHashMapCache";

/// Concurrent-map cache provider with per-entry single-flight loading.
pub struct LocalMapCacheProvider {
    stores: DashMap<String, Arc<CacheStore>>,
    /// Entry bound applied to every store; `None` disables eviction.
    max_entries_per_store: Option<usize>,
    metrics: CacheMetrics,
}

impl LocalMapCacheProvider {
    /// Create a provider with unbounded stores.
    pub fn new() -> Self {
        Self::with_store_capacity(None)
    }

    /// Create a provider whose stores drop their oldest non-locked entries
    /// once they exceed `max_entries` (the bounded-memory replacement for
    /// GC-cooperative value reclamation).
    pub fn with_store_capacity(max_entries: Option<usize>) -> Self {
        Self {
            stores: DashMap::new(),
            max_entries_per_store: max_entries,
            metrics: CacheMetrics::new(),
        }
    }

    /// Store for `name`, created idempotently. Concurrent first accesses
    /// converge on one instance.
    fn store_for(&self, name: &str) -> Arc<CacheStore> {
        self.stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CacheStore::new(name, self.max_entries_per_store)))
            .clone()
    }

    async fn load_and_get_inner(
        &self,
        key: &CacheKey,
        store_name: &str,
        loader: CacheLoader<'_>,
        ttl_ms: i64,
        cache_empty_results: bool,
    ) -> Result<Option<CachedObject>, CacheError> {
        if ttl_ms < 0 {
            return Err(CacheError::NegativeTtl { ttl_ms });
        }
        let ttl = Duration::from_millis(ttl_ms as u64);
        let store = self.store_for(store_name);
        let entry = store.entry(key);

        match entry.lookup() {
            Lookup::Value(obj) => {
                self.metrics.hit();
                debug!(store = %store_name, key = %key, "Cache hit");
                return Ok(Some(obj));
            }
            Lookup::Empty => {
                self.metrics.hit();
                debug!(store = %store_name, key = %key, "Cache hit (cached empty)");
                return Ok(None);
            }
            Lookup::Miss => {}
        }

        let result = {
            let _guard = match timeout(LOAD_LOCK_TIMEOUT, entry.lock()).await {
                Ok(guard) => guard,
                Err(_) => {
                    warn!(store = %store_name, key = %key, "Load lock not released within timeout");
                    return Err(CacheError::LockTimeout {
                        store: store_name.to_string(),
                        key: key.clone(),
                    });
                }
            };

            // Re-check under the lock: a racing loader may have published.
            match entry.lookup() {
                Lookup::Value(obj) => {
                    self.metrics.hit();
                    return Ok(Some(obj));
                }
                Lookup::Empty => {
                    self.metrics.hit();
                    return Ok(None);
                }
                Lookup::Miss => {}
            }

            self.metrics.miss();
            debug!(store = %store_name, key = %key, "Cache miss, loading");
            let loaded = loader(key.clone())
                .await
                .map_err(|source| CacheError::Load { source })?;
            self.metrics.load();

            match loaded {
                Some(obj) => {
                    entry.publish(SlotValue::Object(Arc::clone(&obj)), ttl);
                    Ok(Some(obj))
                }
                None if cache_empty_results => {
                    entry.publish(SlotValue::Empty, ttl);
                    Ok(None)
                }
                None => {
                    // Empty results are not retained; the next call reloads.
                    store.remove(key);
                    Ok(None)
                }
            }
        };

        let evicted = store.evict_over_limit();
        if evicted > 0 {
            self.metrics.evicted(evicted);
        }
        result
    }

    async fn put_inner(
        &self,
        key: CacheKey,
        value: CachedObject,
        store_name: &str,
        ttl_ms: i64,
    ) -> Result<(), CacheError> {
        if ttl_ms < 0 {
            return Err(CacheError::NegativeTtl { ttl_ms });
        }
        let ttl = Duration::from_millis(ttl_ms as u64);
        let store = self.store_for(store_name);
        let entry = store.entry(&key);

        // Same lock as load_and_get: an upsert never interleaves with an
        // in-flight load for this key.
        let _guard = timeout(LOAD_LOCK_TIMEOUT, entry.lock())
            .await
            .map_err(|_| CacheError::LockTimeout {
                store: store_name.to_string(),
                key: key.clone(),
            })?;
        entry.publish(SlotValue::Object(value), ttl);
        drop(_guard);

        let evicted = store.evict_over_limit();
        if evicted > 0 {
            self.metrics.evicted(evicted);
        }
        Ok(())
    }
}

impl Default for LocalMapCacheProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheProvider for LocalMapCacheProvider {
    fn load_and_get<'a>(
        &'a self,
        key: &'a CacheKey,
        store: &'a str,
        loader: CacheLoader<'a>,
        ttl_ms: i64,
        cache_empty_results: bool,
    ) -> BoxFuture<'a, Result<Option<CachedObject>, CacheError>> {
        Box::pin(self.load_and_get_inner(key, store, loader, ttl_ms, cache_empty_results))
    }

    fn get<'a>(
        &'a self,
        key: &'a CacheKey,
        store: &'a str,
    ) -> BoxFuture<'a, Result<Option<CachedObject>, CacheError>> {
        Box::pin(async move {
            let cache = self.store_for(store);
            match cache.peek(key) {
                Some(entry) => match entry.lookup() {
                    Lookup::Value(obj) => {
                        self.metrics.hit();
                        Ok(Some(obj))
                    }
                    Lookup::Empty => {
                        self.metrics.hit();
                        Ok(None)
                    }
                    Lookup::Miss => {
                        self.metrics.miss();
                        Ok(None)
                    }
                },
                None => {
                    self.metrics.miss();
                    Ok(None)
                }
            }
        })
    }

    fn put<'a>(
        &'a self,
        key: CacheKey,
        value: CachedObject,
        store: &'a str,
        ttl_ms: i64,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(self.put_inner(key, value, store, ttl_ms))
    }

    fn invalidate<'a>(
        &'a self,
        key: &'a CacheKey,
        store: &'a str,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            self.store_for(store).remove(key);
            self.metrics.invalidated();
            debug!(store = %store, key = %key, "Invalidated cache entry");
            Ok(())
        })
    }

    fn cache_names(&self) -> BoxFuture<'_, HashSet<String>> {
        Box::pin(async move { self.stores.iter().map(|kv| kv.key().clone()).collect() })
    }

    fn keys<'a>(&'a self, store: &'a str) -> BoxFuture<'a, HashSet<CacheKey>> {
        Box::pin(async move {
            let (keys, purged) = self.store_for(store).keys_with_purge();
            if purged > 0 {
                self.metrics.expired(purged);
                debug!(store = %store, purged, "Purged expired entries");
            }
            keys
        })
    }

    fn clear<'a>(&'a self, store: &'a str) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            self.store_for(store).clear();
            Ok(())
        })
    }

    fn drop_all(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            self.stores.clear();
            Ok(())
        })
    }

    fn name(&self) -> &str {
        LOCAL_PROVIDER_NAME
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.metrics.snapshot(LOCAL_PROVIDER_NAME)
    }
}
