//! Integration tests for the caching layer.
//!
//! These tests verify the complete flow including:
//! - Call → key derivation → provider dispatch → typed result
//! - Single-flight loading under real task concurrency
//! - TTL expiry with realistic timing
//! - Provider selection through the registry
//!
//! Run with: `cargo test --test cache_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use curdle::providers::{
    LocalMapCacheProvider, MokaCacheProvider, NullCacheProvider, NULL_PROVIDER_NAME,
};
use curdle::{
    BoxError, CacheClient, CacheError, CacheKey, CacheProfile, Cacheable, CachingLayer, CallArg,
    MethodCall, ProviderRegistry, TypeToken,
};

// ============================================================================
// Test Entities
// ============================================================================

/// A user record keyed by its id field.
#[derive(Debug, PartialEq)]
struct User {
    id: i64,
    name: String,
}

impl Cacheable for User {
    fn identity(&self) -> Result<Option<CacheKey>, BoxError> {
        Ok(Some(self.id.into()))
    }

    fn type_token(&self) -> TypeToken {
        TypeToken::of::<User>()
    }
}

/// An admin embeds a user; its cache identity lives on the embedded record.
#[derive(Debug)]
struct Admin {
    base: User,
    #[allow(dead_code)]
    privileges: Vec<String>,
}

impl Cacheable for Admin {
    fn identity(&self) -> Result<Option<CacheKey>, BoxError> {
        Ok(None)
    }

    fn parent(&self) -> Option<&dyn Cacheable> {
        Some(&self.base)
    }

    fn type_token(&self) -> TypeToken {
        TypeToken::of::<Admin>()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn user(id: i64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
    }
}

/// Registry with all three shipped providers, local map as default.
fn full_registry() -> Arc<ProviderRegistry> {
    Arc::new(
        ProviderRegistry::builder()
            .register(Arc::new(LocalMapCacheProvider::new()))
            .unwrap()
            .register(Arc::new(MokaCacheProvider::new()))
            .unwrap()
            .register(Arc::new(NullCacheProvider::new()))
            .unwrap()
            .build()
            .unwrap(),
    )
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Concurrent tasks racing on one key share a single load.
///
/// Sixteen tasks hit the same cold key while the loader sleeps. Exactly one
/// loader run is expected; every task sees its result.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_share_a_single_load() {
    let client = CacheClient::new(Arc::new(LocalMapCacheProvider::new()), "Users");
    let loads = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::from(1i64);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let client = client.clone();
        let loads = Arc::clone(&loads);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            client
                .load_and_get::<User, _, _>(
                    &key,
                    move |key| async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        let id = match key {
                            CacheKey::Int(id) => id,
                            _ => 0,
                        };
                        Ok(Some(User {
                            id,
                            name: "ada".to_string(),
                        }))
                    },
                    60_000,
                    false,
                )
                .await
                .unwrap()
                .unwrap()
        }));
    }

    for handle in handles {
        let cached = handle.await.unwrap();
        assert_eq!(cached.name, "ada");
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

/// A stored value is served until its TTL elapses, then reloaded.
#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let client = CacheClient::new(Arc::new(LocalMapCacheProvider::new()), "Users");
    let key = CacheKey::from(7i64);

    client.put(key.clone(), user(7, "grace"), 300).await.unwrap();
    assert_eq!(
        client.get::<User>(&key).await.unwrap().unwrap().name,
        "grace"
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(client.get::<User>(&key).await.unwrap().is_none());

    // The next load-and-get repopulates the store.
    let reloaded = client
        .load_and_get::<User, _, _>(
            &key,
            |_key| async { Ok(Some(user(7, "grace-2"))) },
            60_000,
            false,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.name, "grace-2");
}

/// Full layer flow: key derived from an entity's inherited identity field.
#[tokio::test]
async fn test_layer_keys_by_inherited_identity_field() {
    let layer = CachingLayer::new(full_registry());
    let profile = CacheProfile::for_type::<Admin>().with_ttl_ms(60_000);

    let admin = Admin {
        base: user(42, "root"),
        privileges: vec!["all".to_string()],
    };

    // A save-style call carrying the entity plus an unrelated argument.
    let call = MethodCall::new(
        "save",
        "AdminService",
        vec![CallArg::Key("audit-ctx".into()), CallArg::Entity(&admin)],
    );
    assert_eq!(layer.derive_key(&call, &profile).unwrap(), CacheKey::from(42i64));

    let stored = layer
        .retrieve::<String, _, _>(&call, &profile, |_key| async {
            Ok(Some("persisted".to_string()))
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*stored, "persisted");

    // A later lookup by plain id hits the same entry.
    let call = MethodCall::new("find", "AdminService", vec![CallArg::Key(42i64.into())]);
    let cached = layer
        .retrieve::<String, _, _>(&call, &profile, |_key| async {
            panic!("should have been served from cache")
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*cached, "persisted");
}

/// Remove drops exactly the derived key; other entries survive.
#[tokio::test]
async fn test_layer_remove_is_key_local() {
    let layer = CachingLayer::new(full_registry());
    let profile = CacheProfile::for_type::<User>().with_ttl_ms(60_000);

    for id in [1i64, 2] {
        let call = MethodCall::new("find", "UserService", vec![CallArg::Key(id.into())]);
        layer
            .retrieve::<User, _, _>(&call, &profile, move |_key| async move {
                Ok(Some(user(id, "u")))
            })
            .await
            .unwrap();
    }

    let doomed = user(1, "u");
    let call = MethodCall::new("delete", "UserService", vec![CallArg::Entity(&doomed)]);
    layer.remove(&call, &profile).await.unwrap();

    let client = layer.client_for(&profile);
    assert!(client.get::<User>(&CacheKey::from(1i64)).await.unwrap().is_none());
    assert!(client.get::<User>(&CacheKey::from(2i64)).await.unwrap().is_some());
}

/// A profile pinned to the null provider never retains anything, while the
/// default provider keeps caching, through one shared registry.
#[tokio::test]
async fn test_provider_selection_through_registry() {
    let layer = CachingLayer::new(full_registry());
    let cached_profile = CacheProfile::for_store("Users").with_ttl_ms(60_000);
    let passthrough_profile = CacheProfile::for_store("Users")
        .with_ttl_ms(60_000)
        .with_provider(NULL_PROVIDER_NAME);

    let loads = Arc::new(AtomicUsize::new(0));
    for profile in [&cached_profile, &cached_profile, &passthrough_profile, &passthrough_profile] {
        let loads = Arc::clone(&loads);
        let call = MethodCall::new("find", "UserService", vec![CallArg::Key(1i64.into())]);
        layer
            .retrieve::<User, _, _>(&call, profile, move |_key| async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Some(user(1, "ada")))
            })
            .await
            .unwrap();
    }
    // One load for the cached profile, one per call for the pass-through.
    assert_eq!(loads.load(Ordering::SeqCst), 3);
}

/// An unknown provider name falls back to the default silently.
#[tokio::test]
async fn test_unknown_provider_falls_back_to_default() {
    let layer = CachingLayer::new(full_registry());
    let profile = CacheProfile::for_store("Users").with_provider("NoSuchBackend");
    assert_eq!(
        layer.client_for(&profile).provider().name(),
        "LocalHashMapCache"
    );
}

/// Reading a value back under the wrong type is an error, not a value.
#[tokio::test]
async fn test_type_mismatch_surfaces_as_error() {
    let layer = CachingLayer::new(full_registry());
    let profile = CacheProfile::for_store("Users").with_ttl_ms(60_000);

    let call = MethodCall::new("find", "UserService", vec![CallArg::Key(1i64.into())]);
    layer
        .retrieve::<User, _, _>(&call, &profile, |_key| async { Ok(Some(user(1, "ada"))) })
        .await
        .unwrap();

    let call = MethodCall::new("find", "UserService", vec![CallArg::Key(1i64.into())]);
    let err = layer
        .retrieve::<String, _, _>(&call, &profile, |_key| async { Ok(None) })
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::TypeMismatch { .. }));
}

/// The moka-backed provider honors the same contract end to end.
#[tokio::test]
async fn test_moka_provider_end_to_end() {
    let client = CacheClient::new(Arc::new(MokaCacheProvider::new()), "Users");
    let loads = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::from(9i64);

    for _ in 0..3 {
        let loads = Arc::clone(&loads);
        let cached = client
            .load_and_get::<User, _, _>(
                &key,
                move |_key| async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(user(9, "lin")))
                },
                60_000,
                false,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.name, "lin");
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    client.invalidate(&key).await.unwrap();
    assert!(client.get::<User>(&key).await.unwrap().is_none());
}

/// Store enumeration sees live keys only; expired entries are purged.
#[tokio::test]
async fn test_key_enumeration_skips_expired_entries() {
    let provider = Arc::new(LocalMapCacheProvider::new());
    let client = CacheClient::new(Arc::clone(&provider) as _, "Users");

    client.put(CacheKey::from(1i64), user(1, "a"), 60_000).await.unwrap();
    client.put(CacheKey::from(2i64), user(2, "b"), 200).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let keys = client.keys().await;
    assert!(keys.contains(&CacheKey::from(1i64)));
    assert!(!keys.contains(&CacheKey::from(2i64)));
}
