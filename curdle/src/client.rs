//! Typed façade over a cache provider.
//!
//! Providers store type-erased values; the client restores the concrete
//! type at the boundary. A value cached under one type and read back under
//! another fails with [`CacheError::TypeMismatch`] instead of handing the
//! caller a wrong-typed value.
//!
//! A client is bound to one provider and one store name. Clients are cheap
//! to create and clone; they hold only an `Arc` and a name.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::error::{BoxError, CacheError};
use crate::key::CacheKey;
use crate::provider::{CacheLoader, CacheProvider, CachedObject};

/// Typed handle onto one store of one provider.
#[derive(Clone)]
pub struct CacheClient {
    provider: Arc<dyn CacheProvider>,
    store: String,
}

impl CacheClient {
    /// Bind a client to a provider and store name.
    pub fn new(provider: Arc<dyn CacheProvider>, store: impl Into<String>) -> Self {
        Self {
            provider,
            store: store.into(),
        }
    }

    /// The store this client addresses.
    pub fn store(&self) -> &str {
        &self.store
    }

    /// The provider behind this client.
    pub fn provider(&self) -> &Arc<dyn CacheProvider> {
        &self.provider
    }

    /// Return the cached value for `key`, loading it via `loader` on a miss.
    ///
    /// # Errors
    ///
    /// Everything [`CacheProvider::load_and_get`] raises, plus
    /// [`CacheError::TypeMismatch`] when the stored value is not a `T`.
    pub async fn load_and_get<T, F, Fut>(
        &self,
        key: &CacheKey,
        loader: F,
        ttl_ms: i64,
        cache_empty_results: bool,
    ) -> Result<Option<Arc<T>>, CacheError>
    where
        T: Any + Send + Sync,
        F: FnOnce(CacheKey) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, BoxError>> + Send + 'static,
    {
        let erased = self
            .provider
            .load_and_get(
                key,
                &self.store,
                erase_loader(loader),
                ttl_ms,
                cache_empty_results,
            )
            .await?;
        self.downcast(key, erased)
    }

    /// Pure typed lookup; never invokes a loader.
    ///
    /// # Errors
    ///
    /// [`CacheError::TypeMismatch`] when the stored value is not a `T`.
    pub async fn get<T>(&self, key: &CacheKey) -> Result<Option<Arc<T>>, CacheError>
    where
        T: Any + Send + Sync,
    {
        let erased = self.provider.get(key, &self.store).await?;
        self.downcast(key, erased)
    }

    /// Unconditional typed upsert with TTL.
    pub async fn put<T>(&self, key: CacheKey, value: T, ttl_ms: i64) -> Result<(), CacheError>
    where
        T: Any + Send + Sync,
    {
        self.provider
            .put(key, Arc::new(value), &self.store, ttl_ms)
            .await
    }

    /// Remove the entry for `key` if present.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.provider.invalidate(key, &self.store).await
    }

    /// Invalidate then load-and-get: always forces a fresh load.
    ///
    /// # Errors
    ///
    /// Everything [`CacheProvider::replace`] raises, plus
    /// [`CacheError::TypeMismatch`] when the freshly loaded value is not a
    /// `T` (possible when another caller races the reload with a different
    /// type).
    pub async fn replace<T, F, Fut>(
        &self,
        key: &CacheKey,
        loader: F,
        ttl_ms: i64,
        cache_empty_results: bool,
    ) -> Result<Option<Arc<T>>, CacheError>
    where
        T: Any + Send + Sync,
        F: FnOnce(CacheKey) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, BoxError>> + Send + 'static,
    {
        let erased = self
            .provider
            .replace(
                key,
                &self.store,
                erase_loader(loader),
                ttl_ms,
                cache_empty_results,
            )
            .await?;
        self.downcast(key, erased)
    }

    /// Live keys in this client's store.
    pub async fn keys(&self) -> std::collections::HashSet<CacheKey> {
        self.provider.keys(&self.store).await
    }

    /// Remove every entry in this client's store.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.provider.clear(&self.store).await
    }

    fn downcast<T>(
        &self,
        key: &CacheKey,
        erased: Option<CachedObject>,
    ) -> Result<Option<Arc<T>>, CacheError>
    where
        T: Any + Send + Sync,
    {
        match erased {
            None => Ok(None),
            Some(object) => match object.downcast::<T>() {
                Ok(value) => Ok(Some(value)),
                Err(_) => Err(CacheError::TypeMismatch {
                    store: self.store.clone(),
                    key: key.clone(),
                    expected: std::any::type_name::<T>(),
                }),
            },
        }
    }
}

/// Wrap a typed loader into the provider's type-erased loader shape.
fn erase_loader<'a, T, F, Fut>(loader: F) -> CacheLoader<'a>
where
    T: Any + Send + Sync,
    F: FnOnce(CacheKey) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<T>, BoxError>> + Send + 'static,
{
    Box::new(move |key| {
        Box::pin(async move {
            let loaded = loader(key).await?;
            Ok(loaded.map(|value| Arc::new(value) as CachedObject))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LocalMapCacheProvider;

    #[derive(Debug, PartialEq)]
    struct Widget {
        id: i64,
        label: String,
    }

    fn client() -> CacheClient {
        CacheClient::new(Arc::new(LocalMapCacheProvider::new()), "widgets")
    }

    #[tokio::test]
    async fn test_typed_round_trip_through_loader() {
        let client = client();
        let key = CacheKey::from(7i64);

        let widget = client
            .load_and_get::<Widget, _, _>(
                &key,
                |key| async move {
                    let id = match key {
                        CacheKey::Int(id) => id,
                        _ => 0,
                    };
                    Ok(Some(Widget {
                        id,
                        label: "anvil".to_string(),
                    }))
                },
                60_000,
                false,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(widget.id, 7);

        let cached = client.get::<Widget>(&key).await.unwrap().unwrap();
        assert_eq!(*cached, *widget);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let client = client();
        let key = CacheKey::from("w-1");
        client
            .put(
                key.clone(),
                Widget {
                    id: 1,
                    label: "hammer".to_string(),
                },
                60_000,
            )
            .await
            .unwrap();
        let cached = client.get::<Widget>(&key).await.unwrap().unwrap();
        assert_eq!(cached.label, "hammer");
    }

    #[tokio::test]
    async fn test_wrong_type_is_a_mismatch_not_a_value() {
        let client = client();
        let key = CacheKey::from(1i64);
        client.put(key.clone(), 42u32, 60_000).await.unwrap();

        let err = client.get::<Widget>(&key).await.unwrap_err();
        match err {
            CacheError::TypeMismatch { store, expected, .. } => {
                assert_eq!(store, "widgets");
                assert!(expected.contains("Widget"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalidate_removes_only_this_key() {
        let client = client();
        client.put(CacheKey::from(1i64), 1u32, 60_000).await.unwrap();
        client.put(CacheKey::from(2i64), 2u32, 60_000).await.unwrap();

        client.invalidate(&CacheKey::from(1i64)).await.unwrap();
        assert!(client.get::<u32>(&CacheKey::from(1i64)).await.unwrap().is_none());
        assert_eq!(
            *client.get::<u32>(&CacheKey::from(2i64)).await.unwrap().unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_replace_forces_a_fresh_load() {
        let client = client();
        let key = CacheKey::from(1i64);
        client.put(key.clone(), 1u32, 60_000).await.unwrap();

        let replaced = client
            .replace::<u32, _, _>(&key, |_key| async { Ok(Some(2u32)) }, 60_000, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*replaced, 2);
        assert_eq!(*client.get::<u32>(&key).await.unwrap().unwrap(), 2);
    }
}
