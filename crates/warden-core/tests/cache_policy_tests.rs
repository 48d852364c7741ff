//! Cache behaviour under failure, expiry, and invalidation policies.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use warden_core::{
    AccessEngine, CacheError, CacheFailurePolicy, CacheStore, Decision, EngineConfig, EngineError,
    Gate, GateRequest, InvalidationPolicy, MemoryCacheStore, MemoryRepository,
};
use warden_model::{Cacheable, CheckTarget, Entity, EntityKind, Principal, Role};

/// Memory store that can be switched into an outage and counts reads.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryCacheStore,
    down: AtomicBool,
    reads: AtomicUsize,
}

impl FlakyStore {
    fn outage(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.down.load(Ordering::SeqCst) {
            Err(CacheError("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.check()?;
        self.inner.put(key, value, ttl).await
    }

    async fn forget(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.inner.forget(key).await
    }
}

async fn setup(config: EngineConfig, store: Arc<FlakyStore>) -> (Arc<AccessEngine>, Role, Principal) {
    let engine = AccessEngine::builder(Arc::new(MemoryRepository::new()))
        .with_config(config)
        .with_cache_store(store)
        .build()
        .unwrap();

    let editor = Role::new(engine.save(Entity::role("editor")).await.unwrap().id);
    engine.save(Entity::permission("posts.edit")).await.unwrap();
    engine
        .attach(&editor, EntityKind::Permission, "posts.edit", None)
        .await
        .unwrap();

    let alice = Principal::new(Uuid::now_v7());
    engine
        .attach(&alice, EntityKind::Role, "editor", None)
        .await
        .unwrap();
    (Arc::new(engine), editor, alice)
}

#[tokio::test]
async fn test_fail_open_recomputes_during_outage() {
    let store = Arc::new(FlakyStore::default());
    let (engine, editor, alice) = setup(EngineConfig::default(), store.clone()).await;

    store.outage(true);
    assert!(engine
        .has_permission(alice, None, &["posts.edit"], false)
        .await
        .unwrap());

    // Writes still commit while the store is down.
    engine
        .detach(&editor, EntityKind::Permission, "posts.edit", None)
        .await
        .unwrap();
    assert!(!engine
        .has_permission(alice, None, &["posts.edit"], false)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_fail_closed_denies_at_the_gate() {
    let store = Arc::new(FlakyStore::default());
    let config = EngineConfig::default().with_cache_failure_policy(CacheFailurePolicy::FailClosed);
    let (engine, editor, alice) = setup(config, store.clone()).await;
    let gate = Gate::new(engine.clone());
    let request = GateRequest::parse(CheckTarget::Permissions, "posts.edit", None, "");

    assert_eq!(gate.check(alice, &request).await, Decision::Allow);
    assert!(engine
        .holder_has_permission(&editor, &["posts.edit"], false)
        .await
        .unwrap());

    store.outage(true);
    let result = engine.has_permission(alice, None, &["posts.edit"], false).await;
    assert!(matches!(result, Err(EngineError::CacheUnavailable(_))));
    assert_eq!(gate.check(alice, &request).await, Decision::Deny);

    // The relation write commits before the failed invalidation is reported.
    let result = engine
        .detach(&editor, EntityKind::Permission, "posts.edit", None)
        .await;
    assert!(matches!(result, Err(EngineError::CacheUnavailable(_))));

    // The failed forget leaves the role's entry stale until it is flushed.
    store.outage(false);
    assert!(engine
        .holder_has_permission(&editor, &["posts.edit"], false)
        .await
        .unwrap());
    engine.flush(&editor).await.unwrap();
    assert!(!engine
        .holder_has_permission(&editor, &["posts.edit"], false)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_ttl_expiry_with_lazy_invalidation() {
    tokio::time::pause();

    let store = Arc::new(FlakyStore::default());
    let config = EngineConfig::default().with_invalidation(InvalidationPolicy::Lazy);
    let ttl = config.cache.ttl();
    let (engine, editor, alice) = setup(config, store).await;

    assert!(engine
        .has_permission(alice, None, &["posts.edit"], false)
        .await
        .unwrap());

    engine
        .detach(&editor, EntityKind::Permission, "posts.edit", None)
        .await
        .unwrap();

    // The role sees its own write immediately.
    assert!(!engine
        .holder_has_permission(&editor, &["posts.edit"], false)
        .await
        .unwrap());
    // The principal's entry is stale until it expires.
    assert!(engine
        .has_permission(alice, None, &["posts.edit"], false)
        .await
        .unwrap());

    tokio::time::advance(ttl + Duration::from_secs(1)).await;
    assert!(!engine
        .has_permission(alice, None, &["posts.edit"], false)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_lazy_principal_refreshes_after_flush() {
    let store = Arc::new(FlakyStore::default());
    let config = EngineConfig::default().with_invalidation(InvalidationPolicy::Lazy);
    let (engine, editor, alice) = setup(config, store).await;

    assert!(engine
        .has_permission(alice, None, &["posts.edit"], false)
        .await
        .unwrap());
    engine
        .detach(&editor, EntityKind::Permission, "posts.edit", None)
        .await
        .unwrap();

    engine.flush(&alice).await.unwrap();
    assert!(!engine
        .has_permission(alice, None, &["posts.edit"], false)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_eager_invalidation_reaches_principals() {
    let store = Arc::new(FlakyStore::default());
    let (engine, editor, alice) = setup(EngineConfig::default(), store.clone()).await;
    let key = alice.cache_key("warden");

    assert!(engine
        .has_permission(alice, None, &["posts.edit"], false)
        .await
        .unwrap());
    assert!(store.inner.contains(&key).await);

    engine
        .detach(&editor, EntityKind::Permission, "posts.edit", None)
        .await
        .unwrap();
    assert!(!store.inner.contains(&key).await);
}

#[tokio::test]
async fn test_second_check_is_served_from_cache() {
    let store = Arc::new(FlakyStore::default());
    let (engine, _, alice) = setup(EngineConfig::default(), store.clone()).await;

    engine.grants(&alice).await.unwrap();
    let key = alice.cache_key("warden");
    let cached = store.inner.get(&key).await.unwrap();
    assert!(cached.is_some());

    let reads = store.reads.load(Ordering::SeqCst);
    let grants = engine.grants(&alice).await.unwrap();
    assert_eq!(store.reads.load(Ordering::SeqCst), reads + 1);
    assert_eq!(grants.roles.len(), 1);
    assert_eq!(grants.permissions.len(), 1);
}

#[tokio::test]
async fn test_disabled_cache_never_touches_store() {
    let store = Arc::new(FlakyStore::default());
    let (engine, _, alice) = setup(EngineConfig::default().without_cache(), store.clone()).await;

    store.outage(true);
    assert!(engine
        .has_permission(alice, None, &["posts.edit"], false)
        .await
        .unwrap());
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}
