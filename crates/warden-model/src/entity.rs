//! # Entities
//!
//! Entity kinds and the stored record shared by roles, positions,
//! permissions, and teams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of entities known to the engine.
///
/// Roles and positions are structurally identical but live in separate
/// namespaces: a name lookup is always qualified by kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A user or service identity that receives assignments.
    Principal,
    /// Named bundle of permissions.
    Role,
    /// Named bundle of permissions in the organizational namespace.
    Position,
    /// Atomic capability.
    Permission,
    /// Scoping dimension for principal assignments.
    Team,
}

impl EntityKind {
    /// Get the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Principal => "principal",
            EntityKind::Role => "role",
            EntityKind::Position => "position",
            EntityKind::Permission => "permission",
            EntityKind::Team => "team",
        }
    }

    /// Parse a kind from its string representation.
    ///
    /// # Example
    ///
    /// ```
    /// use warden_model::EntityKind;
    ///
    /// assert_eq!(EntityKind::parse("role"), Some(EntityKind::Role));
    /// assert_eq!(EntityKind::parse("USER"), Some(EntityKind::Principal));
    /// assert_eq!(EntityKind::parse("group"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "principal" | "user" => Some(EntityKind::Principal),
            "role" => Some(EntityKind::Role),
            "position" => Some(EntityKind::Position),
            "permission" => Some(EntityKind::Permission),
            "team" => Some(EntityKind::Team),
            _ => None,
        }
    }

    /// The holder kind for this entity kind, if it can hold capabilities.
    pub fn as_holder(&self) -> Option<HolderKind> {
        match self {
            EntityKind::Principal => Some(HolderKind::Principal),
            EntityKind::Role => Some(HolderKind::Role),
            EntityKind::Position => Some(HolderKind::Position),
            EntityKind::Permission | EntityKind::Team => None,
        }
    }

    /// Whether records of this kind are managed through the lifecycle operations.
    ///
    /// Principals are owned by the identity layer and have no record here.
    pub fn has_record(&self) -> bool {
        !matches!(self, EntityKind::Principal)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of entities that hold capabilities and own a cache entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HolderKind {
    /// Holds roles, positions, and direct permissions.
    Principal,
    /// Holds permissions.
    Role,
    /// Holds permissions.
    Position,
}

impl HolderKind {
    /// Get the string representation of the holder kind.
    pub fn as_str(&self) -> &'static str {
        self.entity_kind().as_str()
    }

    /// The entity kind this holder kind corresponds to.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            HolderKind::Principal => EntityKind::Principal,
            HolderKind::Role => EntityKind::Role,
            HolderKind::Position => EntityKind::Position,
        }
    }
}

impl std::fmt::Display for HolderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored role, position, permission, or team.
///
/// # Example
///
/// ```
/// use warden_model::{Entity, EntityKind};
///
/// let role = Entity::role("editor").with_display_name("Editor");
/// assert_eq!(role.kind, EntityKind::Role);
/// assert!(!role.is_trashed());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    /// Unique entity ID
    pub id: Uuid,

    /// Entity kind
    pub kind: EntityKind,

    /// Name, unique per kind
    pub name: String,

    /// Human readable name
    pub display_name: Option<String>,

    /// Free-form description
    pub description: Option<String>,

    /// When the entity was created
    pub created_at: DateTime<Utc>,

    /// When the entity was last saved
    pub updated_at: DateTime<Utc>,

    /// Soft-delete tombstone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// Create a new entity of the given kind.
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            kind,
            name: name.into(),
            display_name: None,
            description: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Create a new role.
    pub fn role(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Role, name)
    }

    /// Create a new position.
    pub fn position(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Position, name)
    }

    /// Create a new permission.
    pub fn permission(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Permission, name)
    }

    /// Create a new team.
    pub fn team(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Team, name)
    }

    /// Set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether the entity is soft-deleted.
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Mark the entity as saved now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
