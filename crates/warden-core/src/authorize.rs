//! Authorization checks.
//!
//! [`evaluate`] is the pure core: a requested list of names against a scoped
//! [`NameSet`]. The engine entry points supply the name set from the
//! principal's cached grants after applying superadmin bypass and team
//! scoping.

use crate::config::TeamScoping;
use crate::engine::AccessEngine;
use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use warden_model::{CheckTarget, EntityKind, EntityRef, NameSet, PermissionBundle, Principal, TeamFilter};

/// A capability expression: names of one target combined with AND or OR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// What the names are checked against
    pub target: CheckTarget,
    /// Requested names, always literals
    pub names: Vec<String>,
    /// All names must match (AND) instead of any (OR)
    pub require_all: bool,
}

impl Check {
    /// Create an OR check.
    pub fn new<I, S>(target: CheckTarget, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target,
            names: names.into_iter().map(Into::into).collect(),
            require_all: false,
        }
    }

    /// Check permissions.
    pub fn permissions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CheckTarget::Permissions, names)
    }

    /// Check roles.
    pub fn roles<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CheckTarget::Roles, names)
    }

    /// Check positions.
    pub fn positions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CheckTarget::Positions, names)
    }

    /// Require every name instead of any.
    pub fn require_all(mut self, require_all: bool) -> Self {
        self.require_all = require_all;
        self
    }
}

/// Evaluate requested names against a scoped name set.
///
/// An empty request is trivially satisfied.
///
/// # Example
///
/// ```
/// use std::collections::HashSet;
/// use warden_core::evaluate;
/// use warden_model::NameSet;
///
/// let names = NameSet::wildcard(HashSet::from(["a".to_string()]));
/// assert!(evaluate(&names, &["a", "b"], false));
/// assert!(!evaluate(&names, &["a", "b"], true));
/// assert!(evaluate(&names, &[] as &[&str], true));
/// ```
pub fn evaluate<S: AsRef<str>>(names: &NameSet, requested: &[S], require_all: bool) -> bool {
    if requested.is_empty() {
        return true;
    }
    if require_all {
        names.contains_all(requested)
    } else {
        names.contains_any(requested)
    }
}

impl AccessEngine {
    /// Check a principal against a capability expression, optionally within a team.
    ///
    /// # Arguments
    ///
    /// * `principal` - Principal being checked
    /// * `team` - Team scope by ID or name; unknown teams are `NotFound`
    /// * `check` - Names, target, and AND/OR mode
    ///
    /// # Returns
    ///
    /// Whether the principal is authorized, or an error if a lookup failed
    /// or the cache faulted under a fail-closed policy
    #[instrument(skip(self, team, check), fields(principal_id = %principal.id, target = check.target.as_str()))]
    pub async fn authorize(&self, principal: Principal, team: Option<EntityRef>, check: &Check) -> EngineResult<bool> {
        if self.config.superadmins.bypasses(principal.id, check.target) {
            debug!("Superadmin bypass");
            return Ok(true);
        }
        if check.names.is_empty() {
            return Ok(true);
        }

        let filter = self.team_filter(team).await?;
        let grants = self.cache.get(&principal).await?;
        let names = grants.names(check.target, filter);
        let allowed = evaluate(&names, check.names.as_slice(), check.require_all);

        debug!(allowed, require_all = check.require_all, "Evaluated check");
        Ok(allowed)
    }

    /// Check permissions.
    pub async fn has_permission<S: AsRef<str>>(
        &self,
        principal: Principal,
        team: Option<EntityRef>,
        names: &[S],
        require_all: bool,
    ) -> EngineResult<bool> {
        let check = Check::permissions(names.iter().map(|s| s.as_ref().to_string())).require_all(require_all);
        self.authorize(principal, team, &check).await
    }

    /// Check roles.
    pub async fn has_role<S: AsRef<str>>(
        &self,
        principal: Principal,
        team: Option<EntityRef>,
        names: &[S],
        require_all: bool,
    ) -> EngineResult<bool> {
        let check = Check::roles(names.iter().map(|s| s.as_ref().to_string())).require_all(require_all);
        self.authorize(principal, team, &check).await
    }

    /// Check positions.
    pub async fn has_position<S: AsRef<str>>(
        &self,
        principal: Principal,
        team: Option<EntityRef>,
        names: &[S],
        require_all: bool,
    ) -> EngineResult<bool> {
        let check = Check::positions(names.iter().map(|s| s.as_ref().to_string())).require_all(require_all);
        self.authorize(principal, team, &check).await
    }

    /// Check a role's or position's own permissions. Superadmin bypass does
    /// not apply, and bundle permissions carry no team.
    ///
    /// Principals go through [`authorize`](Self::authorize) so team scoping
    /// always applies to them:
    ///
    /// ```compile_fail
    /// # use std::sync::Arc;
    /// # use warden_core::{AccessEngine, MemoryRepository};
    /// # use warden_model::Principal;
    /// # async fn example() -> warden_core::EngineResult<()> {
    /// let engine = AccessEngine::builder(Arc::new(MemoryRepository::new())).build()?;
    /// let alice = Principal::new(uuid::Uuid::now_v7());
    /// engine.holder_has_permission(&alice, &["posts.edit"], false).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn holder_has_permission<H, S>(&self, holder: &H, names: &[S], require_all: bool) -> EngineResult<bool>
    where
        H: PermissionBundle + ?Sized + Sync,
        S: AsRef<str>,
    {
        if names.is_empty() {
            return Ok(true);
        }
        let grants = self.cache.get(holder).await?;
        let names_held = grants.names(CheckTarget::Permissions, TeamFilter::Any);
        Ok(evaluate(&names_held, names, require_all))
    }

    /// Which tuples contribute to a check with the given team argument.
    pub(crate) async fn team_filter(&self, team: Option<EntityRef>) -> EngineResult<TeamFilter> {
        if !self.config.teams.enabled {
            return Ok(TeamFilter::Any);
        }
        match team {
            Some(reference) => {
                let id = self.resolve(EntityKind::Team, &reference).await?;
                Ok(TeamFilter::Team(id))
            }
            None => Ok(match self.config.teams.scoping {
                TeamScoping::Strict => TeamFilter::Global,
                TeamScoping::Permissive => TeamFilter::Any,
            }),
        }
    }
}
