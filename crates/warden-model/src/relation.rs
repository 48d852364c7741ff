//! # Relations
//!
//! The five relation tables connecting holders to what they hold.
//! Only principal-facing relations carry a team.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{EntityKind, HolderKind};

/// A relation table between a holder and a related entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Principal holds a role (team-scoped).
    PrincipalRole,
    /// Principal holds a position (team-scoped).
    PrincipalPosition,
    /// Principal holds a permission directly (team-scoped).
    PrincipalPermission,
    /// Role bundles a permission.
    RolePermission,
    /// Position bundles a permission.
    PositionPermission,
}

impl RelationKind {
    /// All relation kinds.
    pub const ALL: [RelationKind; 5] = [
        RelationKind::PrincipalRole,
        RelationKind::PrincipalPosition,
        RelationKind::PrincipalPermission,
        RelationKind::RolePermission,
        RelationKind::PositionPermission,
    ];

    /// Find the relation between a holder kind and a related kind.
    ///
    /// # Example
    ///
    /// ```
    /// use warden_model::{EntityKind, HolderKind, RelationKind};
    ///
    /// assert_eq!(
    ///     RelationKind::between(HolderKind::Role, EntityKind::Permission),
    ///     Some(RelationKind::RolePermission)
    /// );
    /// assert_eq!(RelationKind::between(HolderKind::Role, EntityKind::Position), None);
    /// ```
    pub fn between(owner: HolderKind, related: EntityKind) -> Option<Self> {
        match (owner, related) {
            (HolderKind::Principal, EntityKind::Role) => Some(RelationKind::PrincipalRole),
            (HolderKind::Principal, EntityKind::Position) => Some(RelationKind::PrincipalPosition),
            (HolderKind::Principal, EntityKind::Permission) => {
                Some(RelationKind::PrincipalPermission)
            }
            (HolderKind::Role, EntityKind::Permission) => Some(RelationKind::RolePermission),
            (HolderKind::Position, EntityKind::Permission) => {
                Some(RelationKind::PositionPermission)
            }
            _ => None,
        }
    }

    /// The holder side of the relation.
    pub fn owner_kind(&self) -> HolderKind {
        match self {
            RelationKind::PrincipalRole
            | RelationKind::PrincipalPosition
            | RelationKind::PrincipalPermission => HolderKind::Principal,
            RelationKind::RolePermission => HolderKind::Role,
            RelationKind::PositionPermission => HolderKind::Position,
        }
    }

    /// The related side of the relation.
    pub fn related_kind(&self) -> EntityKind {
        match self {
            RelationKind::PrincipalRole => EntityKind::Role,
            RelationKind::PrincipalPosition => EntityKind::Position,
            RelationKind::PrincipalPermission
            | RelationKind::RolePermission
            | RelationKind::PositionPermission => EntityKind::Permission,
        }
    }

    /// Whether tuples of this relation carry a team.
    pub fn is_team_scoped(&self) -> bool {
        self.owner_kind() == HolderKind::Principal
    }

    /// Relations in which an entity of `kind` participates, on either side.
    pub fn involving(kind: EntityKind) -> Vec<RelationKind> {
        Self::ALL
            .into_iter()
            .filter(|r| r.owner_kind().entity_kind() == kind || r.related_kind() == kind)
            .collect()
    }

    /// Get the string representation of the relation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::PrincipalRole => "principal_role",
            RelationKind::PrincipalPosition => "principal_position",
            RelationKind::PrincipalPermission => "principal_permission",
            RelationKind::RolePermission => "role_permission",
            RelationKind::PositionPermission => "position_permission",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a relation table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationTuple {
    /// Relation table
    pub relation: RelationKind,
    /// Holder ID
    pub owner_id: Uuid,
    /// Related entity ID
    pub related_id: Uuid,
    /// Team scope, `None` for global
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<Uuid>,
}

impl RelationTuple {
    /// Create a tuple. The team is dropped for relations that are not team-scoped.
    pub fn new(relation: RelationKind, owner_id: Uuid, related_id: Uuid, team_id: Option<Uuid>) -> Self {
        Self {
            relation,
            owner_id,
            related_id,
            team_id: if relation.is_team_scoped() { team_id } else { None },
        }
    }
}

/// Result of replacing a relation set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncChanges {
    /// IDs newly attached
    pub attached: Vec<Uuid>,
    /// IDs removed
    pub detached: Vec<Uuid>,
}

impl SyncChanges {
    /// Whether the sync changed nothing.
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }

    /// Compute the diff between a prior set and a desired set.
    ///
    /// Order follows `desired` for attachments and `current` for detachments;
    /// duplicate IDs in `desired` are collapsed.
    ///
    /// # Example
    ///
    /// ```
    /// use uuid::Uuid;
    /// use warden_model::SyncChanges;
    ///
    /// let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
    /// let changes = SyncChanges::diff(&[a, b], &[b, c]);
    /// assert_eq!(changes.attached, vec![c]);
    /// assert_eq!(changes.detached, vec![a]);
    /// ```
    pub fn diff(current: &[Uuid], desired: &[Uuid]) -> Self {
        let mut attached = Vec::new();
        for id in desired {
            if !current.contains(id) && !attached.contains(id) {
                attached.push(*id);
            }
        }
        let detached = current
            .iter()
            .filter(|id| !desired.contains(id))
            .copied()
            .collect();
        Self { attached, detached }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_sides() {
        for relation in RelationKind::ALL {
            assert_eq!(
                RelationKind::between(relation.owner_kind(), relation.related_kind()),
                Some(relation)
            );
        }
    }

    #[test]
    fn test_team_scoped_relations() {
        assert!(RelationKind::PrincipalRole.is_team_scoped());
        assert!(RelationKind::PrincipalPosition.is_team_scoped());
        assert!(RelationKind::PrincipalPermission.is_team_scoped());
        assert!(!RelationKind::RolePermission.is_team_scoped());
        assert!(!RelationKind::PositionPermission.is_team_scoped());
    }

    #[test]
    fn test_team_dropped_for_unscoped_relation() {
        let team = Some(Uuid::now_v7());
        let tuple = RelationTuple::new(RelationKind::RolePermission, Uuid::now_v7(), Uuid::now_v7(), team);
        assert_eq!(tuple.team_id, None);

        let tuple = RelationTuple::new(RelationKind::PrincipalRole, Uuid::now_v7(), Uuid::now_v7(), team);
        assert_eq!(tuple.team_id, team);
    }

    #[test]
    fn test_involving() {
        let role = RelationKind::involving(EntityKind::Role);
        assert_eq!(role, vec![RelationKind::PrincipalRole, RelationKind::RolePermission]);

        let permission = RelationKind::involving(EntityKind::Permission);
        assert_eq!(permission.len(), 3);
        assert!(RelationKind::involving(EntityKind::Team).is_empty());
    }

    #[test]
    fn test_diff_identical_sets_is_empty() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        assert!(SyncChanges::diff(&[a, b], &[b, a]).is_empty());
    }

    #[test]
    fn test_diff_collapses_duplicates() {
        let a = Uuid::now_v7();
        let changes = SyncChanges::diff(&[], &[a, a]);
        assert_eq!(changes.attached, vec![a]);
        assert!(changes.detached.is_empty());
    }
}
