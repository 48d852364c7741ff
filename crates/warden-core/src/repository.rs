//! Persistent store contract.
//!
//! The engine never talks to a database directly. Implementations map these
//! calls onto their own schema; [`crate::memory::MemoryRepository`] is the
//! in-process reference implementation.

use crate::error::EngineResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use warden_model::{Entity, EntityKind, Grant, GrantSet, HolderRef, RelationKind, RelationTuple, SyncChanges};

/// Read/write access to entities and relation tuples.
///
/// Soft-deleted entities must contribute no grants and be invisible to
/// [`find_id_by_name`](Repository::find_id_by_name), while
/// [`entity`](Repository::entity) still returns them so they can be restored
/// or force-deleted. Tuples scoped to a soft-deleted team contribute nothing
/// either.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Roles, positions, and permissions held directly by `holder`.
    ///
    /// Principal grants carry the team of the tuple they came through. Role and
    /// position holders only populate `permissions`.
    async fn load_direct_grants(&self, holder: HolderRef) -> EngineResult<GrantSet>;

    /// Permissions reachable through the holder's assigned roles and positions,
    /// tagged with the team of the assignment. Empty for non-principals.
    async fn load_grants_via_roles_and_positions(&self, holder: HolderRef) -> EngineResult<Vec<Grant>>;

    /// Look up a live entity by name within its kind.
    async fn find_id_by_name(&self, kind: EntityKind, name: &str) -> EngineResult<Option<Uuid>>;

    /// Fetch an entity by ID, including soft-deleted ones.
    async fn entity(&self, kind: EntityKind, id: Uuid) -> EngineResult<Option<Entity>>;

    /// Insert or update an entity.
    ///
    /// Fails with `DuplicateName` if another entity of the same kind, live or
    /// soft-deleted, already uses the name.
    async fn save_entity(&self, entity: &Entity) -> EngineResult<()>;

    /// Permanently remove an entity. Returns whether it existed.
    async fn remove_entity(&self, kind: EntityKind, id: Uuid) -> EngineResult<bool>;

    /// Set or clear the soft-delete tombstone. Returns whether the entity exists.
    async fn set_deleted_at(
        &self,
        kind: EntityKind,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
    ) -> EngineResult<bool>;

    /// IDs related to `owner` through `relation` within exactly `team`.
    async fn related_ids(&self, relation: RelationKind, owner: Uuid, team: Option<Uuid>) -> EngineResult<Vec<Uuid>>;

    /// Holders related to `related` through `relation`, across every team.
    async fn owners_of(&self, relation: RelationKind, related: Uuid) -> EngineResult<Vec<Uuid>>;

    /// Insert a tuple. Returns whether it was new.
    async fn write_relation(&self, tuple: RelationTuple) -> EngineResult<bool>;

    /// Remove a tuple. Returns whether it existed.
    async fn remove_relation(&self, tuple: RelationTuple) -> EngineResult<bool>;

    /// Replace the owner's relation set within `team` with exactly `related`.
    async fn sync_relation(
        &self,
        relation: RelationKind,
        owner: Uuid,
        team: Option<Uuid>,
        related: &[Uuid],
    ) -> EngineResult<SyncChanges>;

    /// Remove every tuple pointing at `related`, returning the removed tuples.
    async fn clear_related(&self, relation: RelationKind, related: Uuid) -> EngineResult<Vec<RelationTuple>>;

    /// Principals holding at least one tuple scoped to `team`.
    async fn team_members(&self, team: Uuid) -> EngineResult<Vec<Uuid>>;

    /// Remove every tuple scoped to `team`, returning the removed tuples.
    async fn clear_team(&self, team: Uuid) -> EngineResult<Vec<RelationTuple>>;
}
