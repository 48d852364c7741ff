//! In-memory repository.
//!
//! Suitable for single-process applications and testing. Tuples are kept in
//! a `BTreeSet` so relation reads come back in a stable order.

use crate::config::{EngineConfig, TableNames};
use crate::error::{EngineError, EngineResult};
use crate::repository::Repository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use warden_model::{
    Entity, EntityKind, Grant, GrantSet, HolderKind, HolderRef, RelationKind, RelationTuple,
    SyncChanges,
};

#[derive(Debug, Default)]
struct State {
    entities: HashMap<(EntityKind, Uuid), Entity>,
    tuples: BTreeSet<RelationTuple>,
}

impl State {
    /// Name of a live entity, `None` if missing or soft-deleted.
    fn live_name(&self, kind: EntityKind, id: Uuid) -> Option<&str> {
        self.entities
            .get(&(kind, id))
            .filter(|e| !e.is_trashed())
            .map(|e| e.name.as_str())
    }

    /// Whether a tuple's team scope is global or a live team.
    fn team_live(&self, team_id: Option<Uuid>) -> bool {
        team_id.map_or(true, |team| self.live_name(EntityKind::Team, team).is_some())
    }

    fn owned(&self, relation: RelationKind, owner: Uuid) -> impl Iterator<Item = &RelationTuple> {
        self.tuples
            .iter()
            .filter(move |t| t.relation == relation && t.owner_id == owner)
    }

    /// Permissions of a role or position, global.
    fn bundle_permissions(&self, relation: RelationKind, owner: Uuid) -> Vec<String> {
        self.owned(relation, owner)
            .filter_map(|t| self.live_name(EntityKind::Permission, t.related_id))
            .map(str::to_string)
            .collect()
    }
}

/// In-memory [`Repository`].
///
/// # Example
///
/// ```rust
/// use warden_core::{MemoryRepository, Repository};
/// use warden_model::{Entity, EntityKind};
///
/// async fn example() {
///     let repo = MemoryRepository::new();
///     let admin = Entity::role("admin");
///     repo.save_entity(&admin).await.unwrap();
///     assert_eq!(
///         repo.find_id_by_name(EntityKind::Role, "admin").await.unwrap(),
///         Some(admin.id)
///     );
/// }
/// ```
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<RwLock<State>>,
    tables: Arc<TableNames>,
}

impl std::fmt::Debug for MemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRepository")
            .field("tables", &self.tables)
            .finish()
    }
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty repository that reports the given table names.
    pub fn with_tables(tables: TableNames) -> Self {
        Self {
            state: Arc::default(),
            tables: Arc::new(tables),
        }
    }

    /// Create an empty repository using the configured table names.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_tables(config.tables.clone())
    }

    /// Table names this repository reports.
    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Snapshot of every stored tuple.
    pub async fn tuples(&self) -> Vec<RelationTuple> {
        self.state.read().await.tuples.iter().copied().collect()
    }

    /// Number of stored entities, including soft-deleted ones.
    pub async fn entity_count(&self) -> usize {
        self.state.read().await.entities.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn load_direct_grants(&self, holder: HolderRef) -> EngineResult<GrantSet> {
        let state = self.state.read().await;
        let mut grants = GrantSet::new();

        match holder.kind {
            HolderKind::Principal => {
                let tuples = state
                    .tuples
                    .iter()
                    .filter(|t| t.owner_id == holder.id && state.team_live(t.team_id));
                for tuple in tuples {
                    let related = tuple.relation.related_kind();
                    let Some(name) = state.live_name(related, tuple.related_id) else {
                        continue;
                    };
                    let grant = Grant::scoped(name, tuple.team_id);
                    match tuple.relation {
                        RelationKind::PrincipalRole => grants.add_role(grant),
                        RelationKind::PrincipalPosition => grants.add_position(grant),
                        RelationKind::PrincipalPermission => grants.add_permission(grant),
                        RelationKind::RolePermission | RelationKind::PositionPermission => {}
                    }
                }
            }
            HolderKind::Role | HolderKind::Position => {
                let relation = match holder.kind {
                    HolderKind::Role => RelationKind::RolePermission,
                    _ => RelationKind::PositionPermission,
                };
                if state.live_name(holder.kind.entity_kind(), holder.id).is_some() {
                    for name in state.bundle_permissions(relation, holder.id) {
                        grants.add_permission(Grant::global(name));
                    }
                }
            }
        }

        Ok(grants)
    }

    async fn load_grants_via_roles_and_positions(&self, holder: HolderRef) -> EngineResult<Vec<Grant>> {
        if holder.kind != HolderKind::Principal {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let mut grants = Vec::new();

        for (assignment, bundle) in [
            (RelationKind::PrincipalRole, RelationKind::RolePermission),
            (RelationKind::PrincipalPosition, RelationKind::PositionPermission),
        ] {
            for tuple in state.owned(assignment, holder.id) {
                if !state.team_live(tuple.team_id) {
                    continue;
                }
                if state
                    .live_name(assignment.related_kind(), tuple.related_id)
                    .is_none()
                {
                    continue;
                }
                for name in state.bundle_permissions(bundle, tuple.related_id) {
                    grants.push(Grant::scoped(name, tuple.team_id));
                }
            }
        }

        Ok(grants)
    }

    async fn find_id_by_name(&self, kind: EntityKind, name: &str) -> EngineResult<Option<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .entities
            .values()
            .find(|e| e.kind == kind && e.name == name && !e.is_trashed())
            .map(|e| e.id))
    }

    async fn entity(&self, kind: EntityKind, id: Uuid) -> EngineResult<Option<Entity>> {
        Ok(self.state.read().await.entities.get(&(kind, id)).cloned())
    }

    async fn save_entity(&self, entity: &Entity) -> EngineResult<()> {
        let table = self
            .tables
            .for_entity(entity.kind)
            .ok_or(EngineError::Unmanaged(entity.kind))?;

        let mut state = self.state.write().await;
        let taken = state
            .entities
            .values()
            .any(|e| e.kind == entity.kind && e.name == entity.name && e.id != entity.id);
        if taken {
            return Err(EngineError::DuplicateName {
                kind: entity.kind,
                name: entity.name.clone(),
            });
        }

        debug!(table = table, id = %entity.id, name = %entity.name, "Saving entity");
        state.entities.insert((entity.kind, entity.id), entity.clone());
        Ok(())
    }

    async fn remove_entity(&self, kind: EntityKind, id: Uuid) -> EngineResult<bool> {
        Ok(self.state.write().await.entities.remove(&(kind, id)).is_some())
    }

    async fn set_deleted_at(
        &self,
        kind: EntityKind,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
    ) -> EngineResult<bool> {
        let mut state = self.state.write().await;
        match state.entities.get_mut(&(kind, id)) {
            Some(entity) => {
                entity.deleted_at = deleted_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn related_ids(&self, relation: RelationKind, owner: Uuid, team: Option<Uuid>) -> EngineResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .owned(relation, owner)
            .filter(|t| t.team_id == team)
            .map(|t| t.related_id)
            .collect())
    }

    async fn owners_of(&self, relation: RelationKind, related: Uuid) -> EngineResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut owners: Vec<Uuid> = state
            .tuples
            .iter()
            .filter(|t| t.relation == relation && t.related_id == related)
            .map(|t| t.owner_id)
            .collect();
        owners.dedup();
        Ok(owners)
    }

    async fn write_relation(&self, tuple: RelationTuple) -> EngineResult<bool> {
        debug!(table = self.tables.for_relation(tuple.relation), owner = %tuple.owner_id, related = %tuple.related_id, "Writing relation");
        Ok(self.state.write().await.tuples.insert(tuple))
    }

    async fn remove_relation(&self, tuple: RelationTuple) -> EngineResult<bool> {
        debug!(table = self.tables.for_relation(tuple.relation), owner = %tuple.owner_id, related = %tuple.related_id, "Removing relation");
        Ok(self.state.write().await.tuples.remove(&tuple))
    }

    async fn sync_relation(
        &self,
        relation: RelationKind,
        owner: Uuid,
        team: Option<Uuid>,
        related: &[Uuid],
    ) -> EngineResult<SyncChanges> {
        let team = if relation.is_team_scoped() { team } else { None };
        let mut state = self.state.write().await;

        let current: Vec<Uuid> = state
            .owned(relation, owner)
            .filter(|t| t.team_id == team)
            .map(|t| t.related_id)
            .collect();
        let changes = SyncChanges::diff(&current, related);

        for id in &changes.detached {
            state
                .tuples
                .remove(&RelationTuple::new(relation, owner, *id, team));
        }
        for id in &changes.attached {
            state
                .tuples
                .insert(RelationTuple::new(relation, owner, *id, team));
        }

        debug!(
            table = self.tables.for_relation(relation),
            owner = %owner,
            attached = changes.attached.len(),
            detached = changes.detached.len(),
            "Synced relation"
        );
        Ok(changes)
    }

    async fn clear_related(&self, relation: RelationKind, related: Uuid) -> EngineResult<Vec<RelationTuple>> {
        let mut state = self.state.write().await;
        let removed: Vec<RelationTuple> = state
            .tuples
            .iter()
            .filter(|t| t.relation == relation && t.related_id == related)
            .copied()
            .collect();
        for tuple in &removed {
            state.tuples.remove(tuple);
        }
        Ok(removed)
    }

    async fn team_members(&self, team: Uuid) -> EngineResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let members: BTreeSet<Uuid> = state
            .tuples
            .iter()
            .filter(|t| t.team_id == Some(team))
            .map(|t| t.owner_id)
            .collect();
        Ok(members.into_iter().collect())
    }

    async fn clear_team(&self, team: Uuid) -> EngineResult<Vec<RelationTuple>> {
        let mut state = self.state.write().await;
        let removed: Vec<RelationTuple> = state
            .tuples
            .iter()
            .filter(|t| t.team_id == Some(team))
            .copied()
            .collect();
        for tuple in &removed {
            state.tuples.remove(tuple);
        }
        debug!(table = self.tables.teams.as_str(), team = %team, removed = removed.len(), "Cleared team tuples");
        Ok(removed)
    }
}
