//! Access engine and its builder.
//!
//! [`AccessEngine`] owns the injected collaborators. Its operations are
//! split across modules by concern: checks in [`crate::authorize`], relation
//! writes in [`crate::mutator`], and entity lifecycle in
//! [`crate::lifecycle`]. Everything runs inline in the caller's task.

use crate::cache::{CacheStore, MemoryCacheStore, PermissionCache};
use crate::config::{EngineConfig, InvalidationPolicy};
use crate::error::{EngineError, EngineResult};
use crate::repository::Repository;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;
use warden_events::{EventSink, LifecycleHook, MutationEvent, NullEventSink};
use warden_model::{Cacheable, EntityKind, EntityRef, GrantSet, HolderRef, PermissionHolder, RelationKind};

/// Permission resolution and mutation engine.
///
/// `Send + Sync`; share it behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use warden_core::{AccessEngine, MemoryRepository};
/// use warden_model::{Entity, EntityKind, Principal};
///
/// async fn example() -> warden_core::EngineResult<()> {
///     let engine = AccessEngine::builder(Arc::new(MemoryRepository::new())).build()?;
///
///     let editor = engine.save(Entity::role("editor")).await?;
///     engine.save(Entity::permission("posts.edit")).await?;
///
///     let role = warden_model::Role::new(editor.id);
///     engine.attach(&role, EntityKind::Permission, "posts.edit", None).await?;
///
///     let alice = Principal::new(uuid::Uuid::now_v7());
///     engine.attach(&alice, EntityKind::Role, "editor", None).await?;
///     assert!(engine.has_permission(alice, None, &["posts.edit"], false).await?);
///     Ok(())
/// }
/// ```
pub struct AccessEngine {
    pub(crate) config: EngineConfig,
    pub(crate) repository: Arc<dyn Repository>,
    pub(crate) cache: PermissionCache,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl std::fmt::Debug for AccessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessEngine")
            .field("config", &self.config)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl AccessEngine {
    /// Start building an engine over a repository.
    pub fn builder(repository: Arc<dyn Repository>) -> EngineBuilder {
        EngineBuilder::new(repository)
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolved grants for any holder, served from the cache.
    pub async fn grants<H>(&self, holder: &H) -> EngineResult<GrantSet>
    where
        H: PermissionHolder + Cacheable + ?Sized + Sync,
    {
        self.cache.get(holder).await
    }

    /// Drop a holder's cached grants.
    pub async fn flush<H>(&self, holder: &H) -> EngineResult<()>
    where
        H: Cacheable + ?Sized + Sync,
    {
        self.cache.invalidate(holder).await
    }

    /// Resolve a reference to the ID of a live entity of `kind`.
    pub async fn resolve(&self, kind: EntityKind, reference: &EntityRef) -> EngineResult<Uuid> {
        match reference {
            EntityRef::Id(id) if !kind.has_record() => Ok(*id),
            EntityRef::Id(id) => match self.repository.entity(kind, *id).await? {
                Some(entity) if !entity.is_trashed() => Ok(entity.id),
                _ => Err(EngineError::not_found(kind, reference)),
            },
            EntityRef::Name(name) => self
                .repository
                .find_id_by_name(kind, name)
                .await?
                .ok_or_else(|| EngineError::not_found(kind, reference)),
        }
    }

    /// Invalidate the cache entry of `kind`/`id` if it is a holder, and under
    /// eager invalidation every holder that reaches it through a relation.
    /// For a team that means every principal with a tuple in the team.
    pub(crate) async fn flush_entity(&self, kind: EntityKind, id: Uuid) -> EngineResult<()> {
        let eager = self.config.invalidation == InvalidationPolicy::Eager;
        let mut pending = vec![(kind, id)];
        let mut seen = HashSet::from([(kind, id)]);

        while let Some((kind, id)) = pending.pop() {
            if let Some(holder_kind) = kind.as_holder() {
                self.cache.invalidate(&HolderRef::new(holder_kind, id)).await?;
            }
            if !eager {
                continue;
            }
            if kind == EntityKind::Team {
                for member in self.repository.team_members(id).await? {
                    if seen.insert((EntityKind::Principal, member)) {
                        pending.push((EntityKind::Principal, member));
                    }
                }
                continue;
            }
            for relation in RelationKind::involving(kind) {
                if relation.related_kind() != kind {
                    continue;
                }
                let owner_kind = relation.owner_kind().entity_kind();
                for owner in self.repository.owners_of(relation, id).await? {
                    if seen.insert((owner_kind, owner)) {
                        debug!(relation = %relation, owner = %owner, "Fanning out invalidation");
                        pending.push((owner_kind, owner));
                    }
                }
            }
        }

        Ok(())
    }

    /// Deliver an event. Sink failures are logged, never returned.
    pub(crate) async fn emit(&self, event: MutationEvent) {
        let event = event.to_event();
        let topic = event.topic();
        if let Err(e) = self.sink.emit(event).await {
            warn!(topic = %topic, error = %e, "Failed to emit mutation event");
        }
    }
}

/// Builder for [`AccessEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    repository: Arc<dyn Repository>,
    store: Option<Arc<dyn CacheStore>>,
    sink: Option<Arc<dyn EventSink>>,
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl EngineBuilder {
    /// Create a builder with default configuration.
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            config: EngineConfig::default(),
            repository,
            store: None,
            sink: None,
            hooks: Vec::new(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the cache store (defaults to an in-memory store).
    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the event sink (defaults to discarding events).
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Add a lifecycle hook. Hooks run in insertion order.
    pub fn with_hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> EngineResult<AccessEngine> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCacheStore::new()));
        let cache = PermissionCache::new(store, self.repository.clone(), self.config.cache.clone());

        Ok(AccessEngine {
            config: self.config,
            repository: self.repository,
            cache,
            sink: self.sink.unwrap_or_else(|| Arc::new(NullEventSink)),
            hooks: self.hooks,
        })
    }
}
