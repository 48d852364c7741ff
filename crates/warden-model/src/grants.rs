//! # Grants
//!
//! Resolved capabilities of a holder. A [`GrantSet`] is what the permission
//! cache stores per holder; a [`NameSet`] is the team-scoped view of one
//! part of it that checks are evaluated against.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::pattern;

/// A capability name reachable by a holder.
///
/// The team is the team of the principal-facing tuple the name was reached
/// through. Role and position grants are always global.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Grant {
    /// Role, position, or permission name.
    pub name: String,
    /// Team scope, `None` for global.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<Uuid>,
}

impl Grant {
    /// Create a global grant.
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team_id: None,
        }
    }

    /// Create a grant scoped to a team.
    pub fn in_team(name: impl Into<String>, team_id: Uuid) -> Self {
        Self {
            name: name.into(),
            team_id: Some(team_id),
        }
    }

    /// Create a grant with an optional team.
    pub fn scoped(name: impl Into<String>, team_id: Option<Uuid>) -> Self {
        Self {
            name: name.into(),
            team_id,
        }
    }
}

/// Which tuples contribute to a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamFilter {
    /// Every tuple regardless of team.
    Any,
    /// Only global tuples.
    Global,
    /// Tuples in this team plus global tuples.
    Team(Uuid),
}

impl TeamFilter {
    /// Check whether a tuple with the given team contributes.
    ///
    /// # Example
    ///
    /// ```
    /// use uuid::Uuid;
    /// use warden_model::TeamFilter;
    ///
    /// let blog = Uuid::now_v7();
    /// let other = Uuid::now_v7();
    /// assert!(TeamFilter::Team(blog).admits(Some(blog)));
    /// assert!(TeamFilter::Team(blog).admits(None));
    /// assert!(!TeamFilter::Team(blog).admits(Some(other)));
    /// assert!(!TeamFilter::Global.admits(Some(blog)));
    /// assert!(TeamFilter::Any.admits(Some(other)));
    /// ```
    pub fn admits(&self, team_id: Option<Uuid>) -> bool {
        match self {
            TeamFilter::Any => true,
            TeamFilter::Global => team_id.is_none(),
            TeamFilter::Team(team) => team_id.is_none() || team_id == Some(*team),
        }
    }
}

/// What a check is evaluated against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckTarget {
    /// Assigned role names.
    Roles,
    /// Assigned position names.
    Positions,
    /// Resolved permission names.
    Permissions,
}

impl CheckTarget {
    /// Get the string representation of the target.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckTarget::Roles => "roles",
            CheckTarget::Positions => "positions",
            CheckTarget::Permissions => "permissions",
        }
    }

    /// Parse a target from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "roles" | "role" => Some(CheckTarget::Roles),
            "positions" | "position" => Some(CheckTarget::Positions),
            "permissions" | "permission" => Some(CheckTarget::Permissions),
            _ => None,
        }
    }
}

/// Resolved grants of one holder, as cached.
///
/// # Example
///
/// ```
/// use warden_model::{CheckTarget, Grant, GrantSet, TeamFilter};
///
/// let mut set = GrantSet::new();
/// set.add_permission(Grant::global("posts.*"));
///
/// let names = set.names(CheckTarget::Permissions, TeamFilter::Global);
/// assert!(names.has("posts.edit"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantSet {
    /// Assigned roles (principals only).
    #[serde(default)]
    pub roles: Vec<Grant>,
    /// Assigned positions (principals only).
    #[serde(default)]
    pub positions: Vec<Grant>,
    /// Direct and reachable permissions.
    #[serde(default)]
    pub permissions: Vec<Grant>,
}

impl GrantSet {
    /// Create an empty grant set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role grant.
    pub fn add_role(&mut self, grant: Grant) {
        push_unique(&mut self.roles, grant);
    }

    /// Add a position grant.
    pub fn add_position(&mut self, grant: Grant) {
        push_unique(&mut self.positions, grant);
    }

    /// Add a permission grant.
    pub fn add_permission(&mut self, grant: Grant) {
        push_unique(&mut self.permissions, grant);
    }

    /// Merge another grant set into this one.
    pub fn merge(&mut self, other: GrantSet) {
        for grant in other.roles {
            self.add_role(grant);
        }
        for grant in other.positions {
            self.add_position(grant);
        }
        for grant in other.permissions {
            self.add_permission(grant);
        }
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.positions.is_empty() && self.permissions.is_empty()
    }

    /// Grants for a target.
    pub fn grants(&self, target: CheckTarget) -> &[Grant] {
        match target {
            CheckTarget::Roles => &self.roles,
            CheckTarget::Positions => &self.positions,
            CheckTarget::Permissions => &self.permissions,
        }
    }

    /// Team-scoped names for a target.
    ///
    /// Permission names keep wildcard semantics; role and position names
    /// compare exactly.
    pub fn names(&self, target: CheckTarget, filter: TeamFilter) -> NameSet {
        let names = self
            .grants(target)
            .iter()
            .filter(|g| filter.admits(g.team_id))
            .map(|g| g.name.clone())
            .collect();
        match target {
            CheckTarget::Permissions => NameSet::wildcard(names),
            CheckTarget::Roles | CheckTarget::Positions => NameSet::exact(names),
        }
    }
}

fn push_unique(grants: &mut Vec<Grant>, grant: Grant) {
    if !grants.contains(&grant) {
        grants.push(grant);
    }
}

/// A scoped set of names that requested names are checked against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet {
    names: HashSet<String>,
    wildcards: bool,
}

impl NameSet {
    /// Names compared exactly.
    pub fn exact(names: HashSet<String>) -> Self {
        Self {
            names,
            wildcards: false,
        }
    }

    /// Names where stored patterns match requested names.
    pub fn wildcard(names: HashSet<String>) -> Self {
        Self {
            names,
            wildcards: true,
        }
    }

    /// Check whether a requested name is granted.
    pub fn has(&self, requested: &str) -> bool {
        if self.names.contains(requested) {
            return true;
        }
        self.wildcards
            && self
                .names
                .iter()
                .any(|stored| pattern::is_pattern(stored) && pattern::matches(stored, requested))
    }

    /// Check whether at least one requested name is granted.
    pub fn contains_any<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        requested.iter().any(|name| self.has(name.as_ref()))
    }

    /// Check whether every requested name is granted.
    pub fn contains_all<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        requested.iter().all(|name| self.has(name.as_ref()))
    }

    /// Get the count of names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate the stored names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_set_dedupes() {
        let mut set = GrantSet::new();
        set.add_permission(Grant::global("a"));
        set.add_permission(Grant::global("a"));
        assert_eq!(set.permissions.len(), 1);

        // Same name in a different team is a distinct grant.
        set.add_permission(Grant::in_team("a", Uuid::now_v7()));
        assert_eq!(set.permissions.len(), 2);
    }

    #[test]
    fn test_grant_set_merge() {
        let mut set1 = GrantSet::new();
        set1.add_permission(Grant::global("a"));

        let mut set2 = GrantSet::new();
        set2.add_permission(Grant::global("a"));
        set2.add_permission(Grant::global("b"));
        set2.add_role(Grant::global("editor"));

        set1.merge(set2);
        assert_eq!(set1.permissions.len(), 2);
        assert_eq!(set1.roles.len(), 1);
        assert!(!set1.is_empty());
    }

    #[test]
    fn test_names_apply_team_filter() {
        let blog = Uuid::now_v7();
        let shop = Uuid::now_v7();
        let mut set = GrantSet::new();
        set.add_permission(Grant::global("global.read"));
        set.add_permission(Grant::in_team("posts.edit", blog));
        set.add_permission(Grant::in_team("orders.edit", shop));

        let in_blog = set.names(CheckTarget::Permissions, TeamFilter::Team(blog));
        assert!(in_blog.has("global.read"));
        assert!(in_blog.has("posts.edit"));
        assert!(!in_blog.has("orders.edit"));

        let global = set.names(CheckTarget::Permissions, TeamFilter::Global);
        assert_eq!(global.len(), 1);
        assert!(global.has("global.read"));

        let any = set.names(CheckTarget::Permissions, TeamFilter::Any);
        assert_eq!(any.len(), 3);
    }

    #[test]
    fn test_role_names_are_exact() {
        let mut set = GrantSet::new();
        set.add_role(Grant::global("admin*"));
        set.add_permission(Grant::global("admin*"));

        let roles = set.names(CheckTarget::Roles, TeamFilter::Any);
        assert!(roles.has("admin*"));
        assert!(!roles.has("administrator"));

        let perms = set.names(CheckTarget::Permissions, TeamFilter::Any);
        assert!(perms.has("administrator"));
    }

    #[test]
    fn test_contains_any_and_all() {
        let mut set = GrantSet::new();
        set.add_permission(Grant::global("a"));
        let names = set.names(CheckTarget::Permissions, TeamFilter::Any);

        assert!(names.contains_any(&["a", "b"]));
        assert!(!names.contains_all(&["a", "b"]));
        assert!(names.contains_all(&["a"]));
        assert!(!names.contains_any(&[""]));
    }

    #[test]
    fn test_grant_set_serde() {
        let mut set = GrantSet::new();
        set.add_role(Grant::in_team("editor", Uuid::now_v7()));
        set.add_permission(Grant::global("posts.*"));

        let json = serde_json::to_string(&set).unwrap();
        let back: GrantSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_check_target_parse() {
        assert_eq!(CheckTarget::parse("positions"), Some(CheckTarget::Positions));
        assert_eq!(CheckTarget::parse("Role"), Some(CheckTarget::Roles));
        assert_eq!(CheckTarget::parse("abilities"), None);
    }
}
