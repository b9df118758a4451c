//! A provider that caches nothing.
//!
//! Every `load_and_get` invokes the loader; every lookup is a miss. Useful
//! for disabling caching (in tests or per deployment) without touching call
//! sites: point the type or the registry default at `"NullCache"` and the
//! contract still holds, minus retention.

use std::collections::HashSet;

use crate::error::CacheError;
use crate::key::CacheKey;
use crate::metrics::{CacheMetrics, CacheStatsSnapshot};
use crate::provider::{BoxFuture, CacheLoader, CacheProvider, CachedObject};

/// Registry name of the null provider.
pub const NULL_PROVIDER_NAME: &str = "NullCache";

/// Pass-through provider: loads always, stores never.
#[derive(Default)]
pub struct NullCacheProvider {
    metrics: CacheMetrics,
}

impl NullCacheProvider {
    /// Create a null provider.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheProvider for NullCacheProvider {
    fn load_and_get<'a>(
        &'a self,
        key: &'a CacheKey,
        _store: &'a str,
        loader: CacheLoader<'a>,
        ttl_ms: i64,
        _cache_empty_results: bool,
    ) -> BoxFuture<'a, Result<Option<CachedObject>, CacheError>> {
        Box::pin(async move {
            // The TTL contract applies even though nothing is retained.
            if ttl_ms < 0 {
                return Err(CacheError::NegativeTtl { ttl_ms });
            }
            self.metrics.miss();
            let loaded = loader(key.clone())
                .await
                .map_err(|source| CacheError::Load { source })?;
            self.metrics.load();
            Ok(loaded)
        })
    }

    fn get<'a>(
        &'a self,
        _key: &'a CacheKey,
        _store: &'a str,
    ) -> BoxFuture<'a, Result<Option<CachedObject>, CacheError>> {
        Box::pin(async move {
            self.metrics.miss();
            Ok(None)
        })
    }

    fn put<'a>(
        &'a self,
        _key: CacheKey,
        _value: CachedObject,
        _store: &'a str,
        ttl_ms: i64,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            if ttl_ms < 0 {
                return Err(CacheError::NegativeTtl { ttl_ms });
            }
            Ok(())
        })
    }

    fn invalidate<'a>(
        &'a self,
        _key: &'a CacheKey,
        _store: &'a str,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move { Ok(()) })
    }

    fn cache_names(&self) -> BoxFuture<'_, HashSet<String>> {
        Box::pin(async move { HashSet::new() })
    }

    fn keys<'a>(&'a self, _store: &'a str) -> BoxFuture<'a, HashSet<CacheKey>> {
        Box::pin(async move { HashSet::new() })
    }

    fn clear<'a>(&'a self, _store: &'a str) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move { Ok(()) })
    }

    fn drop_all(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move { Ok(()) })
    }

    fn name(&self) -> &str {
        NULL_PROVIDER_NAME
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.metrics.snapshot(NULL_PROVIDER_NAME)
    }
}
