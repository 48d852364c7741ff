//! # Warden Model
//!
//! Data model for the Warden access-control engine.
//!
//! ## Overview
//!
//! The warden-model crate handles:
//! - **Entities**: Roles, positions, permissions, and teams
//! - **Relations**: The five holder-facing relation tables
//! - **Holders**: Capability traits implemented by principals, roles, and positions
//! - **Grants**: Resolved, team-tagged capability names and their scoped views
//! - **Patterns**: Wildcard matching for stored permission names
//!
//! ## Architecture
//!
//! ```text
//! Principal ──(team?)──→ Role ─────→ Permission
//!           ──(team?)──→ Position ─→ Permission
//!           ──(team?)──────────────→ Permission
//! ```
//!
//! Roles and positions are parallel namespaces. Only principal-facing
//! relations carry a team.
//!
//! ## Usage
//!
//! ```rust
//! use uuid::Uuid;
//! use warden_model::{CheckTarget, Grant, GrantSet, TeamFilter};
//!
//! let blog = Uuid::now_v7();
//! let mut grants = GrantSet::new();
//! grants.add_permission(Grant::in_team("posts.edit", blog));
//! grants.add_permission(Grant::global("users.*"));
//!
//! let names = grants.names(CheckTarget::Permissions, TeamFilter::Team(blog));
//! assert!(names.has("posts.edit"));
//! assert!(names.has("users.create"));
//!
//! let global = grants.names(CheckTarget::Permissions, TeamFilter::Global);
//! assert!(!global.has("posts.edit"));
//! ```

pub mod entity;
pub mod grants;
pub mod holder;
pub mod pattern;
pub mod relation;

// Re-export main types for convenience
pub use entity::{Entity, EntityKind, HolderKind};
pub use grants::{CheckTarget, Grant, GrantSet, NameSet, TeamFilter};
pub use holder::{
    Cacheable, EntityRef, HolderRef, PermissionBundle, PermissionHolder, Position, Principal,
    RelationMutable, Role,
};
pub use relation::{RelationKind, RelationTuple, SyncChanges};
