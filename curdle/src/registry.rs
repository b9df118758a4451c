//! Provider registration and lookup.
//!
//! The registry is built once at startup by whoever owns the process wiring
//! and passed to the caching layer — an owned instance, never process-global
//! state, so tests and embedders each get their own. Registration is closed
//! after [`ProviderRegistryBuilder::build`]: provider names are stable for
//! the process lifetime.
//!
//! Lookup never fails: a blank, absent or unregistered name falls back to
//! the configured default provider, whose presence `build` verifies.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{DEFAULT_PROVIDER_NAME, DEFAULT_TTL_MS};
use crate::provider::CacheProvider;

/// Errors raised while assembling a [`ProviderRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two providers declared the same name. A silent overwrite would make
    /// one of them unreachable, so this fails at startup.
    #[error("duplicate cache provider name: {name}")]
    DuplicateProvider {
        /// The contested provider name.
        name: String,
    },

    /// The configured default provider name is not registered.
    #[error("default cache provider {name} is not registered")]
    UnknownDefaultProvider {
        /// The missing default name.
        name: String,
    },
}

/// Immutable name → provider mapping with a validated default.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CacheProvider>>,
    default_provider: String,
    default_ttl_ms: i64,
}

impl ProviderRegistry {
    /// Start building a registry.
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    /// Resolve a provider by name.
    ///
    /// A blank or absent name, or a name no provider registered under,
    /// resolves to the default provider.
    pub fn resolve(&self, requested: Option<&str>) -> Arc<dyn CacheProvider> {
        let requested = match requested {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.default_provider,
        };
        match self.providers.get(requested) {
            Some(provider) => Arc::clone(provider),
            None => {
                warn!(
                    requested = %requested,
                    default = %self.default_provider,
                    "Unknown cache provider requested, falling back to default"
                );
                Arc::clone(&self.providers[&self.default_provider])
            }
        }
    }

    /// The default provider.
    pub fn default_provider(&self) -> Arc<dyn CacheProvider> {
        Arc::clone(&self.providers[&self.default_provider])
    }

    /// Default TTL in milliseconds for calls with no declared TTL.
    pub fn default_ttl_ms(&self) -> i64 {
        self.default_ttl_ms
    }

    /// Names of all registered providers.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// All registered providers.
    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn CacheProvider>> {
        self.providers.values()
    }
}

/// Builder collecting providers before the registry is sealed.
pub struct ProviderRegistryBuilder {
    providers: HashMap<String, Arc<dyn CacheProvider>>,
    default_provider: String,
    default_ttl_ms: i64,
}

impl ProviderRegistryBuilder {
    fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: DEFAULT_PROVIDER_NAME.to_string(),
            default_ttl_ms: DEFAULT_TTL_MS,
        }
    }

    /// Register a provider under its declared name.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateProvider`] when the name is already taken.
    pub fn register(mut self, provider: Arc<dyn CacheProvider>) -> Result<Self, RegistryError> {
        let name = provider.name().to_string();
        if self.providers.contains_key(&name) {
            return Err(RegistryError::DuplicateProvider { name });
        }
        debug!(provider = %name, "Registered cache provider");
        self.providers.insert(name, provider);
        Ok(self)
    }

    /// Override the default provider name.
    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = name.into();
        self
    }

    /// Override the default TTL in milliseconds.
    pub fn with_default_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.default_ttl_ms = ttl_ms;
        self
    }

    /// Seal the registry.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownDefaultProvider`] when the default provider
    /// name does not resolve to a registered provider.
    pub fn build(self) -> Result<ProviderRegistry, RegistryError> {
        if !self.providers.contains_key(&self.default_provider) {
            return Err(RegistryError::UnknownDefaultProvider {
                name: self.default_provider,
            });
        }
        Ok(ProviderRegistry {
            providers: self.providers,
            default_provider: self.default_provider,
            default_ttl_ms: self.default_ttl_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        LocalMapCacheProvider, NullCacheProvider, LOCAL_PROVIDER_NAME, NULL_PROVIDER_NAME,
    };

    fn registry_with_both() -> ProviderRegistry {
        ProviderRegistry::builder()
            .register(Arc::new(LocalMapCacheProvider::new()))
            .unwrap()
            .register(Arc::new(NullCacheProvider::new()))
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_by_name() {
        let registry = registry_with_both();
        let provider = registry.resolve(Some(NULL_PROVIDER_NAME));
        assert_eq!(provider.name(), NULL_PROVIDER_NAME);
    }

    #[test]
    fn test_absent_name_resolves_to_default() {
        let registry = registry_with_both();
        assert_eq!(registry.resolve(None).name(), LOCAL_PROVIDER_NAME);
    }

    #[test]
    fn test_blank_name_resolves_to_default() {
        let registry = registry_with_both();
        assert_eq!(registry.resolve(Some("  ")).name(), LOCAL_PROVIDER_NAME);
    }

    #[test]
    fn test_unknown_name_falls_back_to_default() {
        let registry = registry_with_both();
        assert_eq!(
            registry.resolve(Some("NoSuchProvider")).name(),
            LOCAL_PROVIDER_NAME
        );
    }

    #[test]
    fn test_duplicate_name_is_a_startup_error() {
        let result = ProviderRegistry::builder()
            .register(Arc::new(LocalMapCacheProvider::new()))
            .unwrap()
            .register(Arc::new(LocalMapCacheProvider::new()));
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateProvider { .. })
        ));
    }

    #[test]
    fn test_unknown_default_is_a_startup_error() {
        let result = ProviderRegistry::builder()
            .register(Arc::new(NullCacheProvider::new()))
            .unwrap()
            .build();
        assert!(matches!(
            result,
            Err(RegistryError::UnknownDefaultProvider { .. })
        ));
    }

    #[test]
    fn test_default_provider_override() {
        let registry = ProviderRegistry::builder()
            .register(Arc::new(NullCacheProvider::new()))
            .unwrap()
            .with_default_provider(NULL_PROVIDER_NAME)
            .build()
            .unwrap();
        assert_eq!(registry.default_provider().name(), NULL_PROVIDER_NAME);
    }

    #[test]
    fn test_default_ttl() {
        let registry = registry_with_both();
        assert_eq!(registry.default_ttl_ms(), DEFAULT_TTL_MS);

        let registry = ProviderRegistry::builder()
            .register(Arc::new(LocalMapCacheProvider::new()))
            .unwrap()
            .with_default_ttl_ms(1_000)
            .build()
            .unwrap();
        assert_eq!(registry.default_ttl_ms(), 1_000);
    }
}
