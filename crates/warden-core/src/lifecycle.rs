//! Entity lifecycle: save, delete, restore.
//!
//! Before-hooks run ahead of any write and may abort. After-hooks run once
//! the write has committed and their failures are only logged.

use crate::engine::AccessEngine;
use crate::error::{EngineError, EngineResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use warden_events::{HookDecision, LifecycleContext, LifecycleStage, MutationEvent};
use warden_model::{Entity, EntityKind, EntityRef, HolderRef, RelationKind, SyncChanges};

/// How `delete` removes an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Set a tombstone and keep relations so the entity can be restored.
    #[default]
    Soft,
    /// Detach every relation and remove the record.
    Force,
}

impl AccessEngine {
    /// Create or update a role, position, permission, or team.
    ///
    /// # Returns
    ///
    /// The stored entity with a fresh `updated_at`
    #[instrument(skip_all, fields(kind = %entity.kind, name = %entity.name))]
    pub async fn save(&self, mut entity: Entity) -> EngineResult<Entity> {
        if !entity.kind.has_record() {
            return Err(EngineError::Unmanaged(entity.kind));
        }
        entity.touch();

        let ctx = LifecycleContext::new(LifecycleStage::Save, entity.clone());
        self.run_before(&ctx).await?;

        self.repository.save_entity(&entity).await?;
        info!(id = %entity.id, "Saved entity");

        self.flush_entity(entity.kind, entity.id).await?;
        self.run_after(&ctx).await;
        self.emit(MutationEvent::Saved {
            entity: entity.clone(),
        })
        .await;
        Ok(entity)
    }

    /// Delete an entity.
    ///
    /// `Soft` sets the tombstone and leaves relations in place. `Force`
    /// detaches the entity from every relation it participates in, on
    /// either side, then removes the record.
    #[instrument(skip(self, reference))]
    pub async fn delete<R>(&self, kind: EntityKind, reference: R, mode: DeleteMode) -> EngineResult<()>
    where
        R: Into<EntityRef>,
    {
        let entity = self.stored_entity(kind, &reference.into()).await?;
        let force = mode == DeleteMode::Force;

        let ctx = LifecycleContext::new(LifecycleStage::Delete, entity.clone()).forced(force);
        self.run_before(&ctx).await?;

        if force {
            self.cascade(&entity).await?;
            self.repository.remove_entity(kind, entity.id).await?;
        } else {
            self.repository
                .set_deleted_at(kind, entity.id, Some(Utc::now()))
                .await?;
        }
        info!(id = %entity.id, force, "Deleted entity");

        self.flush_entity(kind, entity.id).await?;
        self.run_after(&ctx).await;
        self.emit(MutationEvent::Deleted {
            kind,
            id: entity.id,
            soft: !force,
        })
        .await;
        Ok(())
    }

    /// Clear a soft-delete tombstone.
    ///
    /// Restoring an entity that is not soft-deleted changes nothing but still
    /// runs hooks and emits `Restored`.
    #[instrument(skip(self))]
    pub async fn restore(&self, kind: EntityKind, id: Uuid) -> EngineResult<Entity> {
        let mut entity = self.stored_entity(kind, &EntityRef::Id(id)).await?;

        let ctx = LifecycleContext::new(LifecycleStage::Restore, entity.clone());
        self.run_before(&ctx).await?;

        self.repository.set_deleted_at(kind, id, None).await?;
        entity.deleted_at = None;
        info!("Restored entity");

        self.flush_entity(kind, id).await?;
        self.run_after(&ctx).await;
        self.emit(MutationEvent::Restored { kind, id }).await;
        Ok(entity)
    }

    /// Fetch a managed entity, soft-deleted ones included.
    async fn stored_entity(&self, kind: EntityKind, reference: &EntityRef) -> EngineResult<Entity> {
        if !kind.has_record() {
            return Err(EngineError::Unmanaged(kind));
        }
        let id = match reference {
            EntityRef::Id(id) => *id,
            EntityRef::Name(_) => self.resolve(kind, reference).await?,
        };
        self.repository
            .entity(kind, id)
            .await?
            .ok_or_else(|| EngineError::not_found(kind, reference))
    }

    /// Empty every relation the entity participates in.
    ///
    /// Holders that lose a tuple are invalidated and receive one `Synced`
    /// event each, per relation.
    async fn cascade(&self, entity: &Entity) -> EngineResult<()> {
        if entity.kind == EntityKind::Team {
            return self.cascade_team(entity.id).await;
        }

        for relation in RelationKind::involving(entity.kind) {
            if relation.owner_kind().entity_kind() == entity.kind {
                let owner = HolderRef::new(relation.owner_kind(), entity.id);
                let changes = self
                    .repository
                    .sync_relation(relation, entity.id, None, &[])
                    .await?;
                if !changes.is_empty() {
                    self.flush_entity(entity.kind, entity.id).await?;
                    self.emit(MutationEvent::Synced {
                        holder: owner,
                        related_kind: relation.related_kind(),
                        team_id: None,
                        changes,
                    })
                    .await;
                }
                continue;
            }

            // Entity is the related side: group removed tuples by holder and team.
            let removed = self.repository.clear_related(relation, entity.id).await?;
            let mut by_holder: BTreeMap<(Uuid, Option<Uuid>), SyncChanges> = BTreeMap::new();
            for tuple in removed {
                by_holder
                    .entry((tuple.owner_id, tuple.team_id))
                    .or_default()
                    .detached
                    .push(tuple.related_id);
            }

            let owner_kind = relation.owner_kind();
            for ((owner_id, team_id), changes) in by_holder {
                self.flush_entity(owner_kind.entity_kind(), owner_id).await?;
                self.emit(MutationEvent::Synced {
                    holder: HolderRef::new(owner_kind, owner_id),
                    related_kind: entity.kind,
                    team_id,
                    changes,
                })
                .await;
            }
        }
        Ok(())
    }

    /// Remove every tuple scoped to a team, one `Synced` per holder and relation.
    async fn cascade_team(&self, team_id: Uuid) -> EngineResult<()> {
        let removed = self.repository.clear_team(team_id).await?;
        let mut by_holder: BTreeMap<(RelationKind, Uuid), SyncChanges> = BTreeMap::new();
        for tuple in removed {
            by_holder
                .entry((tuple.relation, tuple.owner_id))
                .or_default()
                .detached
                .push(tuple.related_id);
        }

        for ((relation, owner_id), changes) in by_holder {
            self.flush_entity(EntityKind::Principal, owner_id).await?;
            self.emit(MutationEvent::Synced {
                holder: HolderRef::new(relation.owner_kind(), owner_id),
                related_kind: relation.related_kind(),
                team_id: Some(team_id),
                changes,
            })
            .await;
        }
        Ok(())
    }

    async fn run_before(&self, ctx: &LifecycleContext) -> EngineResult<()> {
        for hook in &self.hooks {
            if let HookDecision::Abort(reason) = hook.before(ctx).await {
                info!(stage = ctx.stage.as_str(), reason = %reason, "Lifecycle operation aborted");
                return Err(EngineError::Aborted { reason });
            }
        }
        Ok(())
    }

    async fn run_after(&self, ctx: &LifecycleContext) {
        for hook in &self.hooks {
            if let Err(e) = hook.after(ctx).await {
                warn!(stage = ctx.stage.as_str(), entity_id = %ctx.entity.id, error = %e, "After-hook failed");
            }
        }
    }
}
