//! Curdle - transparent, declarative method-result caching
//!
//! Curdle caches the results of designated method calls behind a declarative
//! profile: the call site (or an interception layer in front of it) says
//! which store, which provider and which TTL, and the library derives the
//! cache key from the call's arguments, serves hits, and loads misses with
//! at-most-one loader per key.
//!
//! # Architecture
//!
//! - [`CachingLayer`] is the entry point: it takes a [`MethodCall`] plus a
//!   [`CacheProfile`], derives the key and dispatches to a provider.
//! - [`CacheProvider`] is the backend contract: TTL-bounded named stores
//!   with single-flight loading. Three implementations ship in
//!   [`providers`]; more can be registered.
//! - [`ProviderRegistry`] maps provider names to instances with a validated
//!   default; built once at startup, never global.
//! - [`CacheClient`] is the typed façade over a provider's type-erased
//!   storage.
//! - [`Cacheable`] lets an entity type declare the field its instances are
//!   keyed by, with ancestor lookup through composition.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use curdle::{
//!     CacheProfile, CachingLayer, CallArg, MethodCall, ProviderRegistry,
//!     providers::LocalMapCacheProvider,
//! };
//!
//! let registry = ProviderRegistry::builder()
//!     .register(Arc::new(LocalMapCacheProvider::new()))?
//!     .build()?;
//! let layer = CachingLayer::new(Arc::new(registry));
//!
//! let profile = CacheProfile::for_store("Users").with_ttl_ms(60_000);
//! let call = MethodCall::new("find", "UserService", vec![CallArg::Key(42i64.into())]);
//! let user = layer
//!     .retrieve::<User, _, _>(&call, &profile, |key| async move { fetch_user(key).await })
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod key;
pub mod layer;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod resolver;
mod store;

pub use client::CacheClient;
pub use config::{CacheSettings, ConfigError, DEFAULT_PROVIDER_NAME, DEFAULT_TTL_MS};
pub use entity::{Cacheable, TypeToken, DEFAULT_ENTITY_TTL_MS};
pub use error::{BoxError, CacheError};
pub use key::CacheKey;
pub use layer::{CacheProfile, CachingLayer};
pub use metrics::{CacheMetrics, CacheStatsSnapshot};
pub use provider::{erase, BoxFuture, CacheLoader, CacheProvider, CachedObject, LOAD_LOCK_TIMEOUT};
pub use registry::{ProviderRegistry, ProviderRegistryBuilder, RegistryError};
pub use resolver::{resolve_key, CallArg, MethodCall};
