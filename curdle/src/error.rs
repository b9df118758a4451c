//! Runtime error taxonomy for cache operations.
//!
//! Two families of failures exist, and callers must be able to tell them
//! apart:
//!
//! - **No cache key** ([`CacheError::NoCacheKey`],
//!   [`CacheError::NoIdentityField`]): the call or the cached type is
//!   misconfigured and no key can ever be derived. These fail every call
//!   through the same method identically, which makes the misconfiguration
//!   easy to catch in testing. Grouped by [`CacheError::is_no_cache_key`].
//! - **Operational failures** (negative TTL, identity accessor failure,
//!   load-lock timeout, stored-type mismatch, loader failure): the
//!   configuration is sound but this particular operation could not
//!   complete.
//!
//! The library never swallows these; they propagate to whoever invoked the
//! cache operation, which decides whether the underlying uncached call
//! should still proceed.

use thiserror::Error;

use crate::key::CacheKey;

/// Boxed error type for sources originating outside the library
/// (identity accessors, loaders).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No rule of the key-derivation algorithm matched the call.
    #[error("could not identify the cache key for {method} in {declaring_type}")]
    NoCacheKey {
        /// Name of the intercepted method.
        method: String,
        /// Type declaring the method.
        declaring_type: String,
    },

    /// The designated type declares no identity field anywhere in its
    /// ancestor chain.
    #[error("no identity field declared on {type_name} or any of its ancestors")]
    NoIdentityField {
        /// Name of the misconfigured cacheable type.
        type_name: String,
    },

    /// The identity accessor of a cacheable type failed.
    #[error("identity accessor failed on {type_name}")]
    KeyAccess {
        /// Type whose accessor failed.
        type_name: String,
        /// The underlying accessor failure.
        #[source]
        source: BoxError,
    },

    /// A negative TTL was supplied. Rejected before any load happens.
    #[error("TTL cannot be negative (got {ttl_ms} ms)")]
    NegativeTtl {
        /// The offending TTL in milliseconds.
        ttl_ms: i64,
    },

    /// A per-entry load lock was not released within the bounded wait.
    #[error("cache value lock not released within timeout (store {store}, key {key})")]
    LockTimeout {
        /// Store holding the contended entry.
        store: String,
        /// Key of the contended entry.
        key: CacheKey,
    },

    /// The stored value's runtime type does not match the requested type.
    #[error("cached object in store {store} under key {key} is not of type {expected}")]
    TypeMismatch {
        /// Store holding the mismatched entry.
        store: String,
        /// Key of the mismatched entry.
        key: CacheKey,
        /// The type the caller asked for.
        expected: &'static str,
    },

    /// The loader invoked on a cache miss failed. Nothing is cached.
    #[error("cache loader failed")]
    Load {
        /// The underlying loader failure.
        #[source]
        source: BoxError,
    },
}

impl CacheError {
    /// Whether this error means no cache key can be derived for the call.
    ///
    /// True for [`CacheError::NoCacheKey`] and
    /// [`CacheError::NoIdentityField`] — the configuration errors that fail
    /// deterministically on every call, as opposed to per-operation
    /// failures.
    pub fn is_no_cache_key(&self) -> bool {
        matches!(
            self,
            CacheError::NoCacheKey { .. } | CacheError::NoIdentityField { .. }
        )
    }
}
