//! Bounded in-memory provider backed by moka.
//!
//! Moka brings lock-free reads, size-bounded LRU eviction and native
//! single-flight loading (its entry API coalesces concurrent initializers
//! for the same key). Per-entry TTL is carried in the stored value and
//! applied through an [`Expiry`] policy, since each insert may declare its
//! own TTL.
//!
//! Capacity eviction makes this provider the second concrete form of early
//! reclamation: an entry may disappear before its nominal expiry, and a
//! reclaimed entry is indistinguishable from an expired one.
//!
//! Unlike the local provider, the bounded wait here covers the loading
//! caller too: moka's entry API gives no separate handle on waiters, so a
//! loader still running at the bound is cancelled and its caller fails with
//! the same timeout error the waiters get.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use moka::future::Cache as MokaCache;
use moka::notification::RemovalCause;
use moka::Expiry;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{BoxError, CacheError};
use crate::key::CacheKey;
use crate::metrics::{CacheMetrics, CacheStatsSnapshot};
use crate::provider::{
    BoxFuture, CacheLoader, CacheProvider, CachedObject, LOAD_LOCK_TIMEOUT,
};

/// Registry name of the moka-backed provider.
pub const MOKA_PROVIDER_NAME: &str = "MokaCache";

/// Default per-store entry bound.
const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// One stored slot: the value (or a cached-empty marker) plus the TTL the
/// expiry policy reads back.
#[derive(Clone)]
struct StoredEntry {
    value: Option<CachedObject>,
    ttl: Duration,
}

/// Expiry policy reading each entry's own TTL.
struct PerEntryTtl;

impl Expiry<CacheKey, StoredEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        entry: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        entry: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// A loader failure observed through moka's shared init result.
///
/// Moka hands the same error to every coalesced waiter as an `Arc`; this
/// wrapper re-exposes it as an error source.
#[derive(Debug)]
struct SharedLoadError(Arc<BoxError>);

impl fmt::Display for SharedLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SharedLoadError {}

/// Size-bounded cache provider over `moka::future::Cache`, one moka cache
/// per store name.
pub struct MokaCacheProvider {
    stores: DashMap<String, MokaCache<CacheKey, StoredEntry>>,
    max_entries_per_store: u64,
    metrics: Arc<CacheMetrics>,
}

impl MokaCacheProvider {
    /// Create a provider with the default per-store entry bound.
    pub fn new() -> Self {
        Self::with_store_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Create a provider whose stores hold at most `max_entries` entries,
    /// evicting LRU-style beyond that.
    pub fn with_store_capacity(max_entries: u64) -> Self {
        Self {
            stores: DashMap::new(),
            max_entries_per_store: max_entries,
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    fn store_for(&self, name: &str) -> MokaCache<CacheKey, StoredEntry> {
        self.stores
            .entry(name.to_string())
            .or_insert_with(|| {
                let metrics = Arc::clone(&self.metrics);
                MokaCache::builder()
                    .max_capacity(self.max_entries_per_store)
                    .expire_after(PerEntryTtl)
                    .eviction_listener(move |_key, _value, cause| match cause {
                        RemovalCause::Expired => metrics.expired(1),
                        RemovalCause::Size => metrics.evicted(1),
                        _ => {}
                    })
                    .build()
            })
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
        let cache = self.store_for(store_name);

        let loader_key = key.clone();
        let init = async move {
            match loader(loader_key).await {
                Ok(loaded) => Ok(StoredEntry { value: loaded, ttl }),
                Err(e) => Err(e),
            }
        };

        let entry = match timeout(
            LOAD_LOCK_TIMEOUT,
            cache.entry(key.clone()).or_try_insert_with(init),
        )
        .await
        {
            Ok(Ok(entry)) => entry,
            Ok(Err(shared)) => {
                return Err(CacheError::Load {
                    source: Box::new(SharedLoadError(shared)),
                })
            }
            Err(_) => {
                warn!(store = %store_name, key = %key, "Load not finished within timeout");
                return Err(CacheError::LockTimeout {
                    store: store_name.to_string(),
                    key: key.clone(),
                });
            }
        };

        if entry.is_fresh() {
            self.metrics.miss();
            self.metrics.load();
            debug!(store = %store_name, key = %key, "Cache miss, loaded");
        } else {
            self.metrics.hit();
        }

        let stored = entry.into_value();
        if stored.value.is_none() && !cache_empty_results {
            // Empty results are not retained; drop the slot we just created.
            cache.invalidate(key).await;
        }
        Ok(stored.value)
    }
}

impl Default for MokaCacheProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheProvider for MokaCacheProvider {
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
            match self.store_for(store).get(key).await {
                Some(stored) => {
                    self.metrics.hit();
                    Ok(stored.value)
                }
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
        Box::pin(async move {
            if ttl_ms < 0 {
                return Err(CacheError::NegativeTtl { ttl_ms });
            }
            let stored = StoredEntry {
                value: Some(value),
                ttl: Duration::from_millis(ttl_ms as u64),
            };
            self.store_for(store).insert(key, stored).await;
            Ok(())
        })
    }

    fn invalidate<'a>(
        &'a self,
        key: &'a CacheKey,
        store: &'a str,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            self.store_for(store).invalidate(key).await;
            self.metrics.invalidated();
            Ok(())
        })
    }

    fn cache_names(&self) -> BoxFuture<'_, HashSet<String>> {
        Box::pin(async move { self.stores.iter().map(|kv| kv.key().clone()).collect() })
    }

    fn keys<'a>(&'a self, store: &'a str) -> BoxFuture<'a, HashSet<CacheKey>> {
        Box::pin(async move {
            let cache = self.store_for(store);
            // Let moka finish pending expirations before enumerating.
            cache.run_pending_tasks().await;
            cache.iter().map(|(key, _)| (*key).clone()).collect()
        })
    }

    fn clear<'a>(&'a self, store: &'a str) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            let cache = self.store_for(store);
            cache.invalidate_all();
            cache.run_pending_tasks().await;
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
        MOKA_PROVIDER_NAME
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.metrics.snapshot(MOKA_PROVIDER_NAME)
    }
}
