//! Cache provider implementations.
//!
//! Each provider implements the [`CacheProvider`] contract and manages its
//! own stores and reclamation strategy. Providers are selected by name
//! through the [`ProviderRegistry`].
//!
//! # Available Providers
//!
//! - [`LocalMapCacheProvider`] (`"LocalHashMapCache"`, the default):
//!   concurrent-map stores with per-entry single-flight load locks and an
//!   optional entry bound.
//! - [`MokaCacheProvider`] (`"MokaCache"`): size-bounded LRU stores over
//!   moka with per-entry TTL.
//! - [`NullCacheProvider`] (`"NullCache"`): caches nothing; for disabling
//!   caching without touching call sites.
//!
//! [`CacheProvider`]: crate::provider::CacheProvider
//! [`ProviderRegistry`]: crate::registry::ProviderRegistry

mod local;
mod moka;
mod null;

pub use local::{LocalMapCacheProvider, LOCAL_PROVIDER_NAME};
pub use moka::{MokaCacheProvider, MOKA_PROVIDER_NAME};
pub use null::{NullCacheProvider, NULL_PROVIDER_NAME};
