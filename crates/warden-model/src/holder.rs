//! # Holders
//!
//! Capability traits implemented by each holder kind. The engine's resolve,
//! cache, and mutation algorithms are written once against these traits.
//!
//! ```text
//! Principal ─┬─ PrincipalRole ──────→ Role ─── RolePermission ──────→ Permission
//!            ├─ PrincipalPosition ──→ Position ─ PositionPermission → Permission
//!            └─ PrincipalPermission ────────────────────────────────→ Permission
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, EntityKind, HolderKind};
use crate::relation::RelationKind;

/// Untyped reference to a holder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HolderRef {
    /// Holder kind
    pub kind: HolderKind,
    /// Holder ID
    pub id: Uuid,
}

impl HolderRef {
    /// Create a holder reference.
    pub fn new(kind: HolderKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for HolderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Something that holds capabilities.
pub trait PermissionHolder {
    /// Untyped reference used by repositories and events.
    fn holder(&self) -> HolderRef;
}

/// Something with its own entry in the permission cache.
pub trait Cacheable {
    /// Cache key for this holder's resolved grants.
    fn cache_key(&self, prefix: &str) -> String;
}

/// Something whose relations can be attached, detached, and synced.
pub trait RelationMutable: PermissionHolder + Cacheable {
    /// Relation tables owned by this holder.
    fn relations(&self) -> &'static [RelationKind];

    /// Relation used to hold entities of `related` kind.
    fn relation_for(&self, related: EntityKind) -> Option<RelationKind> {
        self.relations()
            .iter()
            .copied()
            .find(|r| r.related_kind() == related)
    }
}

/// A role or position: a named bundle whose permissions carry no team.
pub trait PermissionBundle: PermissionHolder + Cacheable {}

/// A principal (user) handle.
///
/// # Example
///
/// ```
/// use uuid::Uuid;
/// use warden_model::{EntityKind, Principal, RelationKind, RelationMutable};
///
/// let user = Principal::new(Uuid::now_v7());
/// assert_eq!(user.relation_for(EntityKind::Role), Some(RelationKind::PrincipalRole));
/// assert_eq!(user.relation_for(EntityKind::Team), None);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Principal {
    /// Principal ID, owned by the identity layer.
    pub id: Uuid,
}

impl Principal {
    /// Create a principal handle.
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

impl PermissionHolder for Principal {
    fn holder(&self) -> HolderRef {
        HolderRef::new(HolderKind::Principal, self.id)
    }
}

impl Cacheable for Principal {
    fn cache_key(&self, prefix: &str) -> String {
        format!("{}:permissions:principal:{}", prefix, self.id)
    }
}

impl RelationMutable for Principal {
    fn relations(&self) -> &'static [RelationKind] {
        &[
            RelationKind::PrincipalRole,
            RelationKind::PrincipalPosition,
            RelationKind::PrincipalPermission,
        ]
    }
}

/// A role handle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Role {
    /// Role ID
    pub id: Uuid,
}

impl Role {
    /// Create a role handle.
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

impl PermissionHolder for Role {
    fn holder(&self) -> HolderRef {
        HolderRef::new(HolderKind::Role, self.id)
    }
}

impl Cacheable for Role {
    fn cache_key(&self, prefix: &str) -> String {
        format!("{}:permissions:role:{}", prefix, self.id)
    }
}

impl PermissionBundle for Role {}

impl RelationMutable for Role {
    fn relations(&self) -> &'static [RelationKind] {
        &[RelationKind::RolePermission]
    }
}

/// A position handle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Position {
    /// Position ID
    pub id: Uuid,
}

impl Position {
    /// Create a position handle.
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

impl PermissionHolder for Position {
    fn holder(&self) -> HolderRef {
        HolderRef::new(HolderKind::Position, self.id)
    }
}

impl Cacheable for Position {
    fn cache_key(&self, prefix: &str) -> String {
        format!("{}:permissions:position:{}", prefix, self.id)
    }
}

impl PermissionBundle for Position {}

impl RelationMutable for Position {
    fn relations(&self) -> &'static [RelationKind] {
        &[RelationKind::PositionPermission]
    }
}

// HolderRef dispatches to the typed handles so untyped callers share their behavior.

impl PermissionHolder for HolderRef {
    fn holder(&self) -> HolderRef {
        *self
    }
}

impl Cacheable for HolderRef {
    fn cache_key(&self, prefix: &str) -> String {
        match self.kind {
            HolderKind::Principal => Principal::new(self.id).cache_key(prefix),
            HolderKind::Role => Role::new(self.id).cache_key(prefix),
            HolderKind::Position => Position::new(self.id).cache_key(prefix),
        }
    }
}

impl RelationMutable for HolderRef {
    fn relations(&self) -> &'static [RelationKind] {
        match self.kind {
            HolderKind::Principal => Principal::new(self.id).relations(),
            HolderKind::Role => Role::new(self.id).relations(),
            HolderKind::Position => Position::new(self.id).relations(),
        }
    }
}

/// Reference to an entity by ID or by name.
///
/// Names are resolved per kind, so the same name can refer to a role and a
/// position without ambiguity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum EntityRef {
    /// Reference by ID.
    Id(Uuid),
    /// Reference by unique name.
    Name(String),
}

impl From<Uuid> for EntityRef {
    fn from(id: Uuid) -> Self {
        EntityRef::Id(id)
    }
}

impl From<&str> for EntityRef {
    fn from(name: &str) -> Self {
        EntityRef::Name(name.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(name: String) -> Self {
        EntityRef::Name(name)
    }
}

impl From<&Entity> for EntityRef {
    fn from(entity: &Entity) -> Self {
        EntityRef::Id(entity.id)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Id(id) => write!(f, "{}", id),
            EntityRef::Name(name) => write!(f, "'{}'", name),
        }
    }
}
