//! Request gate adapter.
//!
//! Translates string-encoded route arguments such as
//! `permission:posts.edit|posts.create,blog,require_all` into a [`Check`] and
//! maps the engine outcome to [`Decision`]. Extracting the principal from a
//! request and short-circuiting on `Deny` is left to the caller's framework.

use crate::authorize::Check;
use crate::engine::AccessEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use warden_model::{CheckTarget, EntityRef, Principal};

/// Separator between names in a gate argument.
pub const NAME_DELIMITER: char = '|';

/// Gate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Let the request through
    Allow,
    /// Reject the request
    Deny,
}

impl Decision {
    /// Check if access is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

/// Parsed gate arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRequest {
    /// Capability expression
    pub check: Check,
    /// Team scope by name
    pub team: Option<EntityRef>,
    /// Guard name from a `guard:` option, for the caller's authentication layer
    pub guard: Option<String>,
}

impl GateRequest {
    /// Parse string-encoded gate arguments.
    ///
    /// # Arguments
    ///
    /// * `target` - What the names are checked against
    /// * `names` - Pipe-separated names, e.g. `admin|editor`
    /// * `team` - Team name; a value carrying options instead is read as options
    /// * `options` - Comma-separated flags: `require_all`, `guard:<name>`
    ///
    /// # Example
    ///
    /// ```
    /// use warden_core::GateRequest;
    /// use warden_model::{CheckTarget, EntityRef};
    ///
    /// let request = GateRequest::parse(CheckTarget::Roles, "admin|editor", Some("blog"), "require_all");
    /// assert_eq!(request.check.names, vec!["admin", "editor"]);
    /// assert!(request.check.require_all);
    /// assert_eq!(request.team, Some(EntityRef::Name("blog".to_string())));
    ///
    /// // Team slot omitted, options in its place
    /// let request = GateRequest::parse(CheckTarget::Permissions, "posts.edit", Some("require_all"), "");
    /// assert_eq!(request.team, None);
    /// assert!(request.check.require_all);
    /// ```
    pub fn parse(target: CheckTarget, names: &str, team: Option<&str>, options: &str) -> Self {
        let team = team.map(str::trim).filter(|t| !t.is_empty());
        let (team, team_options) = match team {
            Some(value) if is_option_list(value) => (None, value),
            other => (other, ""),
        };

        let flags: Vec<&str> = options
            .split(',')
            .chain(team_options.split(','))
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();

        let names: Vec<String> = names
            .split(NAME_DELIMITER)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            check: Check::new(target, names).require_all(flags.contains(&"require_all")),
            team: team.map(EntityRef::from),
            guard: flags
                .iter()
                .find_map(|f| f.strip_prefix("guard:"))
                .map(str::to_string),
        }
    }
}

fn is_option_list(value: &str) -> bool {
    value
        .split(',')
        .map(str::trim)
        .any(|f| f == "require_all" || f.starts_with("guard:"))
}

/// Gate that answers requests with `Allow` or `Deny`.
#[derive(Debug, Clone)]
pub struct Gate {
    engine: Arc<AccessEngine>,
}

impl Gate {
    /// Create a gate over a shared engine.
    pub fn new(engine: Arc<AccessEngine>) -> Self {
        Self { engine }
    }

    /// Decide a request.
    ///
    /// Engine errors, such as an unknown team or a fail-closed cache fault,
    /// deny.
    pub async fn check(&self, principal: Principal, request: &GateRequest) -> Decision {
        match self
            .engine
            .authorize(principal, request.team.clone(), &request.check)
            .await
        {
            Ok(allowed) => Decision::from(allowed),
            Err(e) if e.is_server_error() => {
                error!(principal_id = %principal.id, error = %e, "Gate check failed");
                Decision::Deny
            }
            Err(e) => {
                warn!(principal_id = %principal.id, error = %e, "Gate check denied");
                Decision::Deny
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_options() {
        let request = GateRequest::parse(
            CheckTarget::Permissions,
            "posts.edit | posts.create||",
            None,
            "require_all,guard:api",
        );
        assert_eq!(request.check.names, vec!["posts.edit", "posts.create"]);
        assert!(request.check.require_all);
        assert_eq!(request.guard.as_deref(), Some("api"));
        assert_eq!(request.team, None);
    }

    #[test]
    fn test_parse_defaults_to_any() {
        let request = GateRequest::parse(CheckTarget::Positions, "cto", Some(" "), "");
        assert!(!request.check.require_all);
        assert_eq!(request.check.target, CheckTarget::Positions);
        assert_eq!(request.team, None);
        assert_eq!(request.guard, None);
    }

    #[test]
    fn test_parse_options_in_team_slot() {
        let request = GateRequest::parse(CheckTarget::Roles, "admin", Some("guard:web,require_all"), "");
        assert_eq!(request.team, None);
        assert!(request.check.require_all);
        assert_eq!(request.guard.as_deref(), Some("web"));
    }

    #[test]
    fn test_parse_empty_names() {
        let request = GateRequest::parse(CheckTarget::Roles, "", Some("blog"), "");
        assert!(request.check.names.is_empty());
        assert_eq!(request.team, Some(EntityRef::Name("blog".to_string())));
    }

    #[test]
    fn test_decision() {
        assert!(Decision::from(true).is_allowed());
        assert!(!Decision::from(false).is_allowed());
    }
}
