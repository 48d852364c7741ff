//! Permission cache.
//!
//! Resolved grants are cached per holder as JSON under the holder's
//! [`Cacheable`] key. The cached value keeps every grant's team tag, so one
//! entry serves checks in every team and invalidation is a single `forget`.

use crate::config::{CacheConfig, CacheFailurePolicy};
use crate::error::{EngineError, EngineResult};
use crate::repository::Repository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};
use warden_model::{Cacheable, GrantSet, PermissionHolder};

/// Cache store fault.
#[derive(Debug, Error)]
#[error("Cache store error: {0}")]
pub struct CacheError(pub String);

impl From<CacheError> for EngineError {
    fn from(err: CacheError) -> Self {
        EngineError::CacheUnavailable(err.0)
    }
}

/// Key/value store holding serialized grant sets.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store an entry for `ttl`.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove an entry.
    async fn forget(&self, key: &str) -> Result<(), CacheError>;
}

/// In-memory cache store with per-entry expiry.
///
/// Expired entries are dropped when read and swept on every `put`.
///
/// Expiry is measured with `tokio::time::Instant`, so paused-clock tests can
/// advance past a TTL without sleeping.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live entry exists for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|(_, expires)| *expires > Instant::now())
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expires)) if *expires > now => return Ok(Some(value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Read-through cache of resolved grant sets.
#[derive(Clone)]
pub struct PermissionCache {
    store: Arc<dyn CacheStore>,
    repository: Arc<dyn Repository>,
    config: CacheConfig,
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("config", &self.config)
            .finish()
    }
}

impl PermissionCache {
    /// Create a cache over a store and the repository it reads through to.
    pub fn new(store: Arc<dyn CacheStore>, repository: Arc<dyn Repository>, config: CacheConfig) -> Self {
        Self {
            store,
            repository,
            config,
        }
    }

    /// Cache settings.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resolved grants for a holder.
    ///
    /// With caching disabled every call recomputes from the repository.
    /// Store faults follow the configured [`CacheFailurePolicy`].
    pub async fn get<H>(&self, holder: &H) -> EngineResult<GrantSet>
    where
        H: PermissionHolder + Cacheable + ?Sized + Sync,
    {
        if !self.config.enabled {
            return self.resolve(holder).await;
        }

        let key = holder.cache_key(&self.config.key_prefix);

        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<GrantSet>(&raw) {
                Ok(grants) => {
                    debug!(key = %key, "Permission cache hit");
                    return Ok(grants);
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding unreadable cache entry"),
            },
            Ok(None) => debug!(key = %key, "Permission cache miss"),
            Err(e) => {
                self.degrade(&key, e)?;
                return self.resolve(holder).await;
            }
        }

        let grants = self.resolve(holder).await?;
        match serde_json::to_string(&grants) {
            Ok(raw) => {
                if let Err(e) = self.store.put(&key, raw, self.config.ttl()).await {
                    self.degrade(&key, e)?;
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize grants"),
        }

        Ok(grants)
    }

    /// Remove a holder's entry.
    pub async fn invalidate<H>(&self, holder: &H) -> EngineResult<()>
    where
        H: Cacheable + ?Sized + Sync,
    {
        if !self.config.enabled {
            return Ok(());
        }

        let key = holder.cache_key(&self.config.key_prefix);
        debug!(key = %key, "Invalidating permission cache");
        if let Err(e) = self.store.forget(&key).await {
            self.degrade(&key, e)?;
        }
        Ok(())
    }

    /// Compute grants directly: direct grants plus everything reachable
    /// through assigned roles and positions.
    async fn resolve<H>(&self, holder: &H) -> EngineResult<GrantSet>
    where
        H: PermissionHolder + ?Sized + Sync,
    {
        let target = holder.holder();
        let mut grants = self.repository.load_direct_grants(target).await?;
        for grant in self
            .repository
            .load_grants_via_roles_and_positions(target)
            .await?
        {
            grants.add_permission(grant);
        }
        Ok(grants)
    }

    /// Apply the failure policy to a store fault.
    fn degrade(&self, key: &str, err: CacheError) -> EngineResult<()> {
        match self.config.failure_policy {
            CacheFailurePolicy::FailOpen => {
                warn!(key = %key, error = %err, "Cache store unavailable, using repository");
                Ok(())
            }
            CacheFailurePolicy::FailClosed => Err(err.into()),
        }
    }
}
