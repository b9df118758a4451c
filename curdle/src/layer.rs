//! The transparent caching layer.
//!
//! This is the piece an interception point talks to: hand it the
//! [`MethodCall`] and a [`CacheProfile`], and it derives the key, picks the
//! provider, applies the effective TTL and runs the operation. Call sites
//! never address a provider or a store directly.
//!
//! # Effective TTL
//!
//! Resolution order, first hit wins:
//! 1. a per-store override configured on the layer,
//! 2. the profile's declared TTL,
//! 3. the registry-wide default.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::client::CacheClient;
use crate::entity::{TypeToken, DEFAULT_ENTITY_TTL_MS};
use crate::error::{BoxError, CacheError};
use crate::key::CacheKey;
use crate::registry::ProviderRegistry;
use crate::resolver::{resolve_key, MethodCall};

/// Declarative cache metadata for one call site or one entity type.
///
/// The profile says where entries live (store and provider), how long they
/// live (TTL) and how keys are derived (designated type, empty-result
/// policy). It carries no values and can be built once and reused.
#[derive(Debug, Clone)]
pub struct CacheProfile {
    store_name: String,
    ttl_ms: Option<i64>,
    provider_name: Option<String>,
    designated: Option<TypeToken>,
    cache_empty_results: bool,
}

impl CacheProfile {
    /// Profile for a named store with no type association.
    ///
    /// TTL falls back to the registry default unless overridden.
    pub fn for_store(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            ttl_ms: None,
            provider_name: None,
            designated: None,
            cache_empty_results: false,
        }
    }

    /// Profile for entities of type `T`.
    ///
    /// The store is named after the type, `T` becomes the designated type
    /// for key derivation, and the TTL defaults to
    /// [`DEFAULT_ENTITY_TTL_MS`].
    pub fn for_type<T: 'static>() -> Self {
        let token = TypeToken::of::<T>();
        Self {
            store_name: token.name.to_string(),
            ttl_ms: Some(DEFAULT_ENTITY_TTL_MS),
            provider_name: None,
            designated: Some(token),
            cache_empty_results: false,
        }
    }

    /// Profile built from an entity's own cache metadata.
    ///
    /// Reads the store name, provider override and TTL the type declares
    /// through [`Cacheable`]; the entity's concrete type becomes the
    /// designated type.
    ///
    /// [`Cacheable`]: crate::entity::Cacheable
    pub fn for_entity(entity: &dyn crate::entity::Cacheable) -> Self {
        Self {
            store_name: entity.store_name().to_string(),
            ttl_ms: Some(entity.ttl_ms()),
            provider_name: entity.provider_name().map(str::to_string),
            designated: Some(entity.type_token()),
            cache_empty_results: false,
        }
    }

    /// Override the store name.
    pub fn with_store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = store_name.into();
        self
    }

    /// Declare a TTL in milliseconds.
    pub fn with_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    /// Pin this profile to a named provider instead of the default.
    pub fn with_provider(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = Some(provider_name.into());
        self
    }

    /// Cache empty load results until they expire instead of reloading.
    pub fn with_cached_empty_results(mut self) -> Self {
        self.cache_empty_results = true;
        self
    }

    /// The store this profile addresses.
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// The designated type for key derivation, if any.
    pub fn designated(&self) -> Option<TypeToken> {
        self.designated
    }
}

/// Derives keys, selects providers and runs cache operations.
pub struct CachingLayer {
    registry: Arc<ProviderRegistry>,
    store_ttl_ms: HashMap<String, i64>,
}

impl CachingLayer {
    /// Layer over a sealed registry with no per-store overrides.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            store_ttl_ms: HashMap::new(),
        }
    }

    /// Override the TTL for one store, taking precedence over the profile.
    pub fn with_store_ttl_ms(mut self, store: impl Into<String>, ttl_ms: i64) -> Self {
        self.store_ttl_ms.insert(store.into(), ttl_ms);
        self
    }

    /// Override TTLs for several stores at once.
    pub fn with_store_ttl_overrides(mut self, overrides: HashMap<String, i64>) -> Self {
        self.store_ttl_ms.extend(overrides);
        self
    }

    /// The registry this layer dispatches to.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Typed client for a profile's provider and store.
    pub fn client_for(&self, profile: &CacheProfile) -> CacheClient {
        let provider = self.registry.resolve(profile.provider_name.as_deref());
        CacheClient::new(provider, profile.store_name.clone())
    }

    /// Effective TTL for a profile after per-store overrides.
    pub fn effective_ttl_ms(&self, profile: &CacheProfile) -> i64 {
        self.store_ttl_ms
            .get(&profile.store_name)
            .copied()
            .or(profile.ttl_ms)
            .unwrap_or_else(|| self.registry.default_ttl_ms())
    }

    /// Derive the key for a call under a profile's designated type.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoCacheKey`], [`CacheError::NoIdentityField`] or
    /// [`CacheError::KeyAccess`] when derivation fails.
    pub fn derive_key(
        &self,
        call: &MethodCall<'_>,
        profile: &CacheProfile,
    ) -> Result<CacheKey, CacheError> {
        resolve_key(call, profile.designated)
    }

    /// Serve a call from cache, loading through `loader` on a miss.
    ///
    /// # Errors
    ///
    /// Key-derivation errors, plus everything
    /// [`CacheClient::load_and_get`] raises.
    #[instrument(skip(self, call, loader), fields(method = %call.method, store = %profile.store_name))]
    pub async fn retrieve<T, F, Fut>(
        &self,
        call: &MethodCall<'_>,
        profile: &CacheProfile,
        loader: F,
    ) -> Result<Option<Arc<T>>, CacheError>
    where
        T: Any + Send + Sync,
        F: FnOnce(CacheKey) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, BoxError>> + Send + 'static,
    {
        let key = self.derive_key(call, profile)?;
        let ttl_ms = self.effective_ttl_ms(profile);
        debug!(key = %key, ttl_ms, "Cache retrieve");
        self.client_for(profile)
            .load_and_get(&key, loader, ttl_ms, profile.cache_empty_results)
            .await
    }

    /// Drop the cached entry for a call's derived key.
    ///
    /// # Errors
    ///
    /// Key-derivation errors; absence of the entry is not an error.
    #[instrument(skip(self, call), fields(method = %call.method, store = %profile.store_name))]
    pub async fn remove(
        &self,
        call: &MethodCall<'_>,
        profile: &CacheProfile,
    ) -> Result<(), CacheError> {
        let key = self.derive_key(call, profile)?;
        debug!(key = %key, "Cache remove");
        self.client_for(profile).invalidate(&key).await
    }

    /// Force a fresh load for a call's derived key, replacing any entry.
    ///
    /// # Errors
    ///
    /// Key-derivation errors, plus everything [`CacheClient::replace`]
    /// raises.
    #[instrument(skip(self, call, loader), fields(method = %call.method, store = %profile.store_name))]
    pub async fn refresh<T, F, Fut>(
        &self,
        call: &MethodCall<'_>,
        profile: &CacheProfile,
        loader: F,
    ) -> Result<Option<Arc<T>>, CacheError>
    where
        T: Any + Send + Sync,
        F: FnOnce(CacheKey) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, BoxError>> + Send + 'static,
    {
        let key = self.derive_key(call, profile)?;
        let ttl_ms = self.effective_ttl_ms(profile);
        debug!(key = %key, ttl_ms, "Cache refresh");
        self.client_for(profile)
            .replace(&key, loader, ttl_ms, profile.cache_empty_results)
            .await
    }
}
