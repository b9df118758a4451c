//! The cache-provider contract.
//!
//! A [`CacheProvider`] is a TTL-bounded key/value store with
//! at-most-one-writer-per-key load semantics, addressed by store name.
//! Providers are selected by name through the registry, so the trait must
//! support trait objects; async methods therefore return
//! `Pin<Box<dyn Future>>` rather than using `async fn`.
//!
//! # Stored values
//!
//! Values are type-erased (`Arc<dyn Any + Send + Sync>`). The typed façade
//! in the client module restores the concrete type on the way out and fails
//! fast on a mismatch instead of handing back a wrong-typed value.
//!
//! # Empty results
//!
//! A loader returning `Ok(None)` models the "found nothing" outcome. Whether
//! that outcome is cached (and served as empty until it expires) or dropped
//! (so the next call loads again) is the caller's choice via
//! `cache_empty_results`.
//!
//! # Concurrency contract
//!
//! - While a load is in flight for a key, concurrent callers for the same
//!   key wait for its result, bounded by a 10 s timeout after which they
//!   fail with [`CacheError::LockTimeout`] rather than hang on a stuck
//!   loader.
//! - Operations on different keys never block each other.
//! - Value and expiry are published together; readers never observe a
//!   half-written entry.
//! - A provider may drop any entry before its nominal expiry (capacity
//!   bound); a reclaimed entry is indistinguishable from an expired one.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BoxError, CacheError};
use crate::key::CacheKey;
use crate::metrics::CacheStatsSnapshot;

/// Bounded wait for a contended per-entry load lock.
///
/// Caps the blast radius of a stuck loader: waiters fail with
/// [`CacheError::LockTimeout`] instead of hanging forever.
pub const LOAD_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased cached value.
pub type CachedObject = Arc<dyn Any + Send + Sync>;

/// Loader invoked on a cache miss.
///
/// Receives the derived key; `Ok(None)` is the empty result. A loader
/// failure propagates as [`CacheError::Load`] and nothing is cached.
pub type CacheLoader<'a> =
    Box<dyn FnOnce(CacheKey) -> BoxFuture<'a, Result<Option<CachedObject>, BoxError>> + Send + 'a>;

/// A named cache backend owning one or more stores.
///
/// Store creation is idempotent: operations on an unknown store name create
/// it, and concurrent first accesses converge on a single store instance.
pub trait CacheProvider: Send + Sync {
    /// Return the cached value for `key`, loading it on a miss.
    ///
    /// A present, unexpired, unreclaimed entry is returned as-is. Otherwise
    /// the loader runs exactly once per miss while holding the entry's load
    /// lock, the result is stored with expiry `now + ttl_ms`, and returned.
    /// `Ok(None)` is returned for an empty load result (cached or not per
    /// `cache_empty_results`).
    ///
    /// # Errors
    ///
    /// [`CacheError::NegativeTtl`] before any load when `ttl_ms < 0`;
    /// [`CacheError::LockTimeout`] when the entry's lock is held past the
    /// bounded wait; [`CacheError::Load`] when the loader fails.
    fn load_and_get<'a>(
        &'a self,
        key: &'a CacheKey,
        store: &'a str,
        loader: CacheLoader<'a>,
        ttl_ms: i64,
        cache_empty_results: bool,
    ) -> BoxFuture<'a, Result<Option<CachedObject>, CacheError>>;

    /// Pure lookup. `Ok(None)` when absent, expired or reclaimed; never
    /// invokes a loader.
    fn get<'a>(
        &'a self,
        key: &'a CacheKey,
        store: &'a str,
    ) -> BoxFuture<'a, Result<Option<CachedObject>, CacheError>>;

    /// Unconditional upsert with TTL.
    fn put<'a>(
        &'a self,
        key: CacheKey,
        value: CachedObject,
        store: &'a str,
        ttl_ms: i64,
    ) -> BoxFuture<'a, Result<(), CacheError>>;

    /// Remove the entry for `key` if present. Absence is not an error.
    fn invalidate<'a>(
        &'a self,
        key: &'a CacheKey,
        store: &'a str,
    ) -> BoxFuture<'a, Result<(), CacheError>>;

    /// Invalidate then load-and-get: always forces a fresh load.
    fn replace<'a>(
        &'a self,
        key: &'a CacheKey,
        store: &'a str,
        loader: CacheLoader<'a>,
        ttl_ms: i64,
        cache_empty_results: bool,
    ) -> BoxFuture<'a, Result<Option<CachedObject>, CacheError>> {
        Box::pin(async move {
            self.invalidate(key, store).await?;
            self.load_and_get(key, store, loader, ttl_ms, cache_empty_results)
                .await
        })
    }

    /// Names of all stores this provider currently holds.
    fn cache_names(&self) -> BoxFuture<'_, HashSet<String>>;

    /// Live keys in a store.
    ///
    /// Expired entries are soft deletes: visible to nobody once past expiry.
    /// This operation opportunistically purges expired, non-locked entries
    /// before returning the key set.
    fn keys<'a>(&'a self, store: &'a str) -> BoxFuture<'a, HashSet<CacheKey>>;

    /// Remove every entry in a store; the store itself stays registered.
    fn clear<'a>(&'a self, store: &'a str) -> BoxFuture<'a, Result<(), CacheError>>;

    /// Remove every store.
    fn drop_all(&self) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Stable provider name, used as the registry key.
    fn name(&self) -> &str;

    /// Point-in-time statistics.
    fn stats(&self) -> CacheStatsSnapshot;
}

/// Erase a concrete value into a [`CachedObject`].
pub fn erase<T: Any + Send + Sync>(value: T) -> CachedObject {
    Arc::new(value)
}
