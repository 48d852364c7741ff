//! Relation mutation.
//!
//! Every write follows the same order: resolve the holder and references,
//! write to the repository, invalidate the cache, emit the event. Resolution
//! failures abort before any write. Invalidation runs even when the event sink fails.

use crate::engine::AccessEngine;
use crate::error::{EngineError, EngineResult};
use tracing::{debug, instrument};
use uuid::Uuid;
use warden_events::MutationEvent;
use warden_model::{EntityKind, EntityRef, RelationKind, RelationMutable, RelationTuple, SyncChanges};

impl AccessEngine {
    /// Attach a related entity to a holder.
    ///
    /// Re-attaching an existing tuple is a no-op write.
    ///
    /// # Arguments
    ///
    /// * `holder` - Principal, role, or position receiving the entity
    /// * `related_kind` - Kind of the entity being attached
    /// * `related` - Entity ID or name
    /// * `team` - Team scope for principal-facing relations
    #[instrument(skip_all, fields(holder = %holder.holder(), related_kind = %related_kind))]
    pub async fn attach<H, R>(
        &self,
        holder: &H,
        related_kind: EntityKind,
        related: R,
        team: Option<EntityRef>,
    ) -> EngineResult<()>
    where
        H: RelationMutable + ?Sized + Sync,
        R: Into<EntityRef>,
    {
        let related = related.into();
        let relation = self.relation_for(holder, related_kind)?;
        self.require_holder(holder).await?;
        let team_id = self.tuple_team(relation, team).await?;
        let related_id = self.resolve(related_kind, &related).await?;

        let owner = holder.holder();
        let tuple = RelationTuple::new(relation, owner.id, related_id, team_id);
        let inserted = self.repository.write_relation(tuple).await?;
        debug!(inserted, related_id = %related_id, "Attached");

        self.flush_entity(owner.kind.entity_kind(), owner.id).await?;
        self.emit(MutationEvent::Attached {
            holder: owner,
            related_kind,
            related_id,
            team_id: tuple.team_id,
        })
        .await;
        Ok(())
    }

    /// Detach a related entity from a holder.
    ///
    /// Detaching a missing tuple is a no-op write.
    #[instrument(skip_all, fields(holder = %holder.holder(), related_kind = %related_kind))]
    pub async fn detach<H, R>(
        &self,
        holder: &H,
        related_kind: EntityKind,
        related: R,
        team: Option<EntityRef>,
    ) -> EngineResult<()>
    where
        H: RelationMutable + ?Sized + Sync,
        R: Into<EntityRef>,
    {
        let related = related.into();
        let relation = self.relation_for(holder, related_kind)?;
        self.require_holder(holder).await?;
        let team_id = self.tuple_team(relation, team).await?;
        let related_id = self.resolve(related_kind, &related).await?;
        self.detach_resolved(holder, relation, related_id, team_id).await
    }

    /// Replace a holder's relation set, within `team` for principal-facing
    /// relations, with exactly `related`.
    ///
    /// # Returns
    ///
    /// The IDs attached and detached; empty when nothing changed
    #[instrument(skip_all, fields(holder = %holder.holder(), related_kind = %related_kind))]
    pub async fn sync<H, I, R>(
        &self,
        holder: &H,
        related_kind: EntityKind,
        related: I,
        team: Option<EntityRef>,
    ) -> EngineResult<SyncChanges>
    where
        H: RelationMutable + ?Sized + Sync,
        I: IntoIterator<Item = R>,
        R: Into<EntityRef>,
    {
        let references: Vec<EntityRef> = related.into_iter().map(Into::into).collect();
        let relation = self.relation_for(holder, related_kind)?;
        self.require_holder(holder).await?;
        let team_id = self.tuple_team(relation, team).await?;

        let mut ids = Vec::with_capacity(references.len());
        for reference in &references {
            ids.push(self.resolve(related_kind, reference).await?);
        }

        let owner = holder.holder();
        let changes = self
            .repository
            .sync_relation(relation, owner.id, team_id, &ids)
            .await?;
        debug!(
            attached = changes.attached.len(),
            detached = changes.detached.len(),
            "Synced"
        );

        self.flush_entity(owner.kind.entity_kind(), owner.id).await?;
        self.emit(MutationEvent::Synced {
            holder: owner,
            related_kind,
            team_id,
            changes: changes.clone(),
        })
        .await;
        Ok(changes)
    }

    /// Attach several entities one at a time.
    ///
    /// Stops at the first failure; earlier items stay attached.
    ///
    /// # Returns
    ///
    /// The number of items attached
    pub async fn attach_many<H, I, R>(
        &self,
        holder: &H,
        related_kind: EntityKind,
        related: I,
        team: Option<EntityRef>,
    ) -> EngineResult<usize>
    where
        H: RelationMutable + ?Sized + Sync,
        I: IntoIterator<Item = R>,
        R: Into<EntityRef>,
    {
        let references: Vec<EntityRef> = related.into_iter().map(Into::into).collect();
        for reference in &references {
            self.attach(holder, related_kind, reference.clone(), team.clone())
                .await?;
        }
        Ok(references.len())
    }

    /// Detach several entities one at a time.
    ///
    /// Stops at the first failure; earlier items stay detached.
    pub async fn detach_many<H, I, R>(
        &self,
        holder: &H,
        related_kind: EntityKind,
        related: I,
        team: Option<EntityRef>,
    ) -> EngineResult<usize>
    where
        H: RelationMutable + ?Sized + Sync,
        I: IntoIterator<Item = R>,
        R: Into<EntityRef>,
    {
        let references: Vec<EntityRef> = related.into_iter().map(Into::into).collect();
        for reference in &references {
            self.detach(holder, related_kind, reference.clone(), team.clone())
                .await?;
        }
        Ok(references.len())
    }

    /// Detach every entity of `related_kind` currently held within `team`,
    /// one at a time, emitting one event per item.
    pub async fn detach_all<H>(
        &self,
        holder: &H,
        related_kind: EntityKind,
        team: Option<EntityRef>,
    ) -> EngineResult<usize>
    where
        H: RelationMutable + ?Sized + Sync,
    {
        let relation = self.relation_for(holder, related_kind)?;
        self.require_holder(holder).await?;
        let team_id = self.tuple_team(relation, team).await?;
        let current = self
            .repository
            .related_ids(relation, holder.holder().id, team_id)
            .await?;

        for related_id in &current {
            self.detach_resolved(holder, relation, *related_id, team_id)
                .await?;
        }
        Ok(current.len())
    }

    async fn detach_resolved<H>(
        &self,
        holder: &H,
        relation: RelationKind,
        related_id: Uuid,
        team_id: Option<Uuid>,
    ) -> EngineResult<()>
    where
        H: RelationMutable + ?Sized + Sync,
    {
        let owner = holder.holder();
        let tuple = RelationTuple::new(relation, owner.id, related_id, team_id);
        let removed = self.repository.remove_relation(tuple).await?;
        debug!(removed, related_id = %related_id, "Detached");

        self.flush_entity(owner.kind.entity_kind(), owner.id).await?;
        self.emit(MutationEvent::Detached {
            holder: owner,
            related_kind: relation.related_kind(),
            related_id,
            team_id: tuple.team_id,
        })
        .await;
        Ok(())
    }

    fn relation_for<H>(&self, holder: &H, related_kind: EntityKind) -> EngineResult<RelationKind>
    where
        H: RelationMutable + ?Sized,
    {
        holder
            .relation_for(related_kind)
            .ok_or(EngineError::InvalidRelation {
                holder: holder.holder().kind,
                related: related_kind,
            })
    }

    /// Roles and positions must be live records. Principals are owned by the
    /// identity layer and are taken as given.
    async fn require_holder<H>(&self, holder: &H) -> EngineResult<()>
    where
        H: RelationMutable + ?Sized + Sync,
    {
        let owner = holder.holder();
        let kind = owner.kind.entity_kind();
        if kind.has_record() {
            self.resolve(kind, &EntityRef::Id(owner.id)).await?;
        }
        Ok(())
    }

    /// Team stored on a tuple of `relation`. Ignored when teams are disabled.
    async fn tuple_team(&self, relation: RelationKind, team: Option<EntityRef>) -> EngineResult<Option<Uuid>> {
        let Some(reference) = team else {
            return Ok(None);
        };
        if !self.config.teams.enabled {
            debug!(team = %reference, "Teams disabled, ignoring team");
            return Ok(None);
        }
        if !relation.is_team_scoped() {
            return Err(EngineError::TeamNotAllowed(relation));
        }
        self.resolve(EntityKind::Team, &reference).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use crate::authorize::Check;
    use crate::cache::MemoryCacheStore;
    use crate::config::{EngineConfig, TeamScoping};
    use crate::engine::AccessEngine;
    use crate::error::EngineError;
    use crate::lifecycle::DeleteMode;
    use crate::memory::MemoryRepository;
    use async_trait::async_trait;
    use std::sync::Arc;
    use uuid::Uuid;
    use warden_events::{Event, EventKind, EventSink, MemoryEventSink, SinkError, SinkResult};
    use warden_model::{Cacheable, Entity, EntityKind, Principal, Role};

    async fn engine(config: EngineConfig) -> (AccessEngine, MemoryEventSink) {
        let sink = MemoryEventSink::new();
        let engine = AccessEngine::builder(Arc::new(MemoryRepository::new()))
            .with_config(config)
            .with_event_sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        for entity in [
            Entity::role("editor"),
            Entity::role("viewer"),
            Entity::permission("posts.edit"),
            Entity::permission("posts.view"),
            Entity::team("blog"),
        ] {
            engine.save(entity).await.unwrap();
        }
        sink.drain().await;
        (engine, sink)
    }

    #[tokio::test]
    async fn test_attach_detach_emit_events() {
        let (engine, sink) = engine(EngineConfig::default()).await;
        let alice = Principal::new(Uuid::now_v7());

        engine
            .attach(&alice, EntityKind::Permission, "posts.edit", None)
            .await
            .unwrap();
        assert!(engine
            .has_permission(alice, None, &["posts.edit"], false)
            .await
            .unwrap());

        engine
            .detach(&alice, EntityKind::Permission, "posts.edit", None)
            .await
            .unwrap();
        assert!(!engine
            .has_permission(alice, None, &["posts.edit"], false)
            .await
            .unwrap());

        let topics: Vec<String> = sink.events().await.iter().map(|e| e.topic()).collect();
        assert_eq!(
            topics,
            vec!["principal.permission.attached", "principal.permission.detached"]
        );
    }

    #[tokio::test]
    async fn test_invalid_pairings_rejected() {
        let (engine, sink) = engine(EngineConfig::default().with_teams(TeamScoping::Strict)).await;
        let editor = engine.resolve(EntityKind::Role, &"editor".into()).await.unwrap();
        let role = Role::new(editor);

        let result = engine.attach(&role, EntityKind::Role, "viewer", None).await;
        assert!(matches!(result, Err(EngineError::InvalidRelation { .. })));

        let result = engine
            .attach(&role, EntityKind::Permission, "posts.edit", Some("blog".into()))
            .await;
        assert!(matches!(result, Err(EngineError::TeamNotAllowed(_))));

        assert!(sink.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_reference_aborts_before_write() {
        let (engine, sink) = engine(EngineConfig::default()).await;
        let alice = Principal::new(Uuid::now_v7());

        let result = engine
            .sync(&alice, EntityKind::Role, ["editor", "ghost"], None)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
        assert!(!engine.has_role(alice, None, &["editor"], false).await.unwrap());
        assert!(sink.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let (engine, sink) = engine(EngineConfig::default()).await;
        let alice = Principal::new(Uuid::now_v7());

        let first = engine
            .sync(&alice, EntityKind::Role, ["editor", "viewer"], None)
            .await
            .unwrap();
        assert_eq!(first.attached.len(), 2);

        let second = engine
            .sync(&alice, EntityKind::Role, ["editor", "viewer"], None)
            .await
            .unwrap();
        assert!(second.is_empty());

        let third = engine
            .sync(&alice, EntityKind::Role, ["viewer"], None)
            .await
            .unwrap();
        assert_eq!(third.detached.len(), 1);
        assert_eq!(sink.events_of(EventKind::Synced).await.len(), 3);
    }

    #[tokio::test]
    async fn test_attach_many_stops_at_first_failure() {
        let (engine, sink) = engine(EngineConfig::default()).await;
        let alice = Principal::new(Uuid::now_v7());

        let result = engine
            .attach_many(&alice, EntityKind::Permission, ["posts.view", "ghost", "posts.edit"], None)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));

        let check = Check::permissions(["posts.view"]);
        assert!(engine.authorize(alice, None, &check).await.unwrap());
        let check = Check::permissions(["posts.edit"]);
        assert!(!engine.authorize(alice, None, &check).await.unwrap());
        assert_eq!(sink.events_of(EventKind::Attached).await.len(), 1);
    }

    #[tokio::test]
    async fn test_detach_all_emits_per_item() {
        let (engine, sink) = engine(EngineConfig::default()).await;
        let alice = Principal::new(Uuid::now_v7());
        let count = engine
            .attach_many(&alice, EntityKind::Permission, ["posts.view", "posts.edit"], None)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let detached = engine
            .detach_all(&alice, EntityKind::Permission, None)
            .await
            .unwrap();
        assert_eq!(detached, 2);
        assert_eq!(sink.events_of(EventKind::Detached).await.len(), 2);
        assert!(engine.grants(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_team_ignored_when_teams_disabled() {
        let (engine, _) = engine(EngineConfig::default()).await;
        let alice = Principal::new(Uuid::now_v7());

        engine
            .attach(&alice, EntityKind::Role, "editor", Some("unknown-team".into()))
            .await
            .unwrap();
        let grants = engine.grants(&alice).await.unwrap();
        assert_eq!(grants.roles.len(), 1);
        assert_eq!(grants.roles[0].team_id, None);
    }

    #[tokio::test]
    async fn test_missing_or_deleted_holder_aborts_before_write() {
        let repo = Arc::new(MemoryRepository::new());
        let sink = MemoryEventSink::new();
        let engine = AccessEngine::builder(repo.clone())
            .with_event_sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        let editor = engine.save(Entity::role("editor")).await.unwrap();
        let viewer = engine.save(Entity::role("viewer")).await.unwrap();
        engine.save(Entity::permission("posts.edit")).await.unwrap();
        sink.drain().await;

        let ghost = Role::new(Uuid::now_v7());
        let result = engine
            .attach(&ghost, EntityKind::Permission, "posts.edit", None)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound { kind: EntityKind::Role, .. })));

        engine
            .delete(EntityKind::Role, editor.id, DeleteMode::Force)
            .await
            .unwrap();
        let removed = Role::new(editor.id);
        let result = engine
            .attach(&removed, EntityKind::Permission, "posts.edit", None)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
        let result = engine
            .sync(&removed, EntityKind::Permission, ["posts.edit"], None)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));

        engine
            .delete(EntityKind::Role, viewer.id, DeleteMode::Soft)
            .await
            .unwrap();
        let trashed = Role::new(viewer.id);
        let result = engine
            .attach(&trashed, EntityKind::Permission, "posts.edit", None)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
        let result = engine.detach_all(&trashed, EntityKind::Permission, None).await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));

        assert!(repo.tuples().await.is_empty());
        assert!(sink.events_of(EventKind::Attached).await.is_empty());
        assert!(sink.events_of(EventKind::Synced).await.is_empty());
        assert!(sink.events_of(EventKind::Detached).await.is_empty());
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn emit(&self, _event: Event) -> SinkResult<()> {
            Err(SinkError::DeliveryError("webhook unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sink_failure_still_invalidates() {
        let store = MemoryCacheStore::new();
        let engine = AccessEngine::builder(Arc::new(MemoryRepository::new()))
            .with_cache_store(Arc::new(store.clone()))
            .with_event_sink(Arc::new(FailingSink))
            .build()
            .unwrap();
        engine.save(Entity::permission("posts.edit")).await.unwrap();

        let alice = Principal::new(Uuid::now_v7());
        let key = alice.cache_key("warden");
        engine
            .attach(&alice, EntityKind::Permission, "posts.edit", None)
            .await
            .unwrap();
        assert!(engine
            .has_permission(alice, None, &["posts.edit"], false)
            .await
            .unwrap());
        assert!(store.contains(&key).await);

        engine
            .detach(&alice, EntityKind::Permission, "posts.edit", None)
            .await
            .unwrap();
        assert!(!store.contains(&key).await);
        assert!(!engine
            .has_permission(alice, None, &["posts.edit"], false)
            .await
            .unwrap());
    }
}
