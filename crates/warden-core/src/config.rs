//! Engine configuration.
//!
//! One explicit [`EngineConfig`] value is passed at construction. Defaults
//! suit local development; [`EngineConfig::from_env`] overlays `WARDEN_*`
//! environment variables on top of them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;
use warden_model::{CheckTarget, EntityKind, RelationKind};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// What a cache-store fault does to a check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheFailurePolicy {
    /// Recompute from the repository and log a warning.
    #[default]
    FailOpen,
    /// Propagate the fault as `CacheUnavailable`.
    FailClosed,
}

/// How checks without a team treat team-tagged tuples.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeamScoping {
    /// Only global tuples contribute.
    #[default]
    Strict,
    /// Every tuple contributes regardless of team.
    Permissive,
}

/// Which cache entries a relation or lifecycle write invalidates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationPolicy {
    /// Only the written holder; indirect holders expire by TTL.
    Lazy,
    /// The written holder plus every holder reaching it through a relation.
    #[default]
    Eager,
}

/// Permission cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether resolved grants are cached at all.
    pub enabled: bool,

    /// Entry lifetime in seconds.
    pub ttl_secs: u64,

    /// Behaviour when the cache store faults.
    pub failure_policy: CacheFailurePolicy,

    /// Prefix for every cache key.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 60,
            failure_policy: CacheFailurePolicy::FailOpen,
            key_prefix: "warden".to_string(),
        }
    }
}

impl CacheConfig {
    /// Get the entry lifetime as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Per-target superadmin bypass toggles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuperadminBypass {
    /// Bypass role checks
    pub roles: bool,
    /// Bypass position checks
    pub positions: bool,
    /// Bypass permission checks
    pub permissions: bool,
}

impl Default for SuperadminBypass {
    fn default() -> Self {
        Self {
            roles: true,
            positions: false,
            permissions: true,
        }
    }
}

impl SuperadminBypass {
    /// Whether superadmins skip checks against `target`.
    pub fn applies(&self, target: CheckTarget) -> bool {
        match target {
            CheckTarget::Roles => self.roles,
            CheckTarget::Positions => self.positions,
            CheckTarget::Permissions => self.permissions,
        }
    }
}

/// Superadmin settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuperadminConfig {
    /// Principal IDs that are superadmins.
    pub ids: HashSet<Uuid>,

    /// Targets the bypass applies to.
    pub bypass: SuperadminBypass,
}

impl SuperadminConfig {
    /// Whether `principal_id` skips a check against `target`.
    pub fn bypasses(&self, principal_id: Uuid, target: CheckTarget) -> bool {
        self.bypass.applies(target) && self.ids.contains(&principal_id)
    }
}

/// Team scoping settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Whether team arguments are honoured at all.
    pub enabled: bool,

    /// Treatment of team-tagged tuples when no team is given.
    pub scoping: TeamScoping,
}

/// Table identifiers used by repository implementations.
///
/// Repositories take these from [`EngineConfig::tables`] at construction,
/// e.g. [`MemoryRepository::from_config`](crate::MemoryRepository::from_config).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNames {
    /// Role records.
    pub roles: String,

    /// Position records.
    pub positions: String,

    /// Permission records.
    pub permissions: String,

    /// Team records.
    pub teams: String,

    /// Principal to role assignments.
    pub principal_role: String,

    /// Principal to position assignments.
    pub principal_position: String,

    /// Direct principal permissions.
    pub principal_permission: String,

    /// Role to permission bundle.
    pub role_permission: String,

    /// Position to permission bundle.
    pub position_permission: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            roles: "roles".to_string(),
            positions: "positions".to_string(),
            permissions: "permissions".to_string(),
            teams: "teams".to_string(),
            principal_role: "role_user".to_string(),
            principal_position: "position_user".to_string(),
            principal_permission: "permission_user".to_string(),
            role_permission: "permission_role".to_string(),
            position_permission: "permission_position".to_string(),
        }
    }
}

impl TableNames {
    /// Table holding entities of `kind`; principals live outside the engine.
    pub fn for_entity(&self, kind: EntityKind) -> Option<&str> {
        match kind {
            EntityKind::Role => Some(&self.roles),
            EntityKind::Position => Some(&self.positions),
            EntityKind::Permission => Some(&self.permissions),
            EntityKind::Team => Some(&self.teams),
            EntityKind::Principal => None,
        }
    }

    /// Every identifier with its field name.
    pub fn entries(&self) -> [(&'static str, &str); 9] {
        [
            ("roles", &self.roles),
            ("positions", &self.positions),
            ("permissions", &self.permissions),
            ("teams", &self.teams),
            ("principal_role", &self.principal_role),
            ("principal_position", &self.principal_position),
            ("principal_permission", &self.principal_permission),
            ("role_permission", &self.role_permission),
            ("position_permission", &self.position_permission),
        ]
    }

    /// Check that every identifier is non-empty, whitespace-free, and unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let entries = self.entries();
        for (i, (field, name)) in entries.iter().enumerate() {
            let key = format!("tables.{}", field);
            if name.is_empty() {
                return Err(ConfigError::invalid(&key, "must not be empty"));
            }
            if name.contains(char::is_whitespace) {
                return Err(ConfigError::invalid(&key, "must not contain whitespace"));
            }
            if entries[..i].iter().any(|(_, other)| other == name) {
                return Err(ConfigError::invalid(&key, format!("'{}' is used twice", name)));
            }
        }
        Ok(())
    }

    /// Pivot table for a relation.
    pub fn for_relation(&self, relation: RelationKind) -> &str {
        match relation {
            RelationKind::PrincipalRole => &self.principal_role,
            RelationKind::PrincipalPosition => &self.principal_position,
            RelationKind::PrincipalPermission => &self.principal_permission,
            RelationKind::RolePermission => &self.role_permission,
            RelationKind::PositionPermission => &self.position_permission,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Permission cache settings.
    pub cache: CacheConfig,

    /// Superadmin settings.
    pub superadmins: SuperadminConfig,

    /// Team scoping settings.
    pub teams: TeamConfig,

    /// Indirect invalidation policy.
    pub invalidation: InvalidationPolicy,

    /// Table identifiers.
    pub tables: TableNames,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WARDEN_CACHE_ENABLED`: Cache resolved grants (default: true)
    /// - `WARDEN_CACHE_TTL_SECS`: Cache entry lifetime (default: 60)
    /// - `WARDEN_CACHE_FAIL_CLOSED`: Propagate cache faults (default: false)
    /// - `WARDEN_CACHE_PREFIX`: Cache key prefix (default: warden)
    /// - `WARDEN_SUPERADMINS`: Comma-separated superadmin principal UUIDs
    /// - `WARDEN_POSITION_BYPASS`: Superadmins bypass position checks (default: false)
    /// - `WARDEN_TEAMS_ENABLED`: Honour team arguments (default: false)
    /// - `WARDEN_TEAMS_STRICT`: Team-less checks see only global tuples (default: true)
    /// - `WARDEN_EAGER_INVALIDATION`: Fan invalidation out to indirect holders (default: true)
    ///
    /// Unlike numeric and boolean settings, which fall back to their default
    /// when unparsable, a malformed superadmin UUID is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let flag = |key: &str, fallback: bool| {
            lookup(key)
                .map(|s| s != "false" && s != "0")
                .unwrap_or(fallback)
        };

        let superadmins = match lookup("WARDEN_SUPERADMINS") {
            Some(raw) => parse_ids(&raw)?,
            None => default.superadmins.ids,
        };

        let config = Self {
            cache: CacheConfig {
                enabled: flag("WARDEN_CACHE_ENABLED", default.cache.enabled),
                ttl_secs: lookup("WARDEN_CACHE_TTL_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.cache.ttl_secs),
                failure_policy: if flag("WARDEN_CACHE_FAIL_CLOSED", false) {
                    CacheFailurePolicy::FailClosed
                } else {
                    CacheFailurePolicy::FailOpen
                },
                key_prefix: lookup("WARDEN_CACHE_PREFIX").unwrap_or(default.cache.key_prefix),
            },
            superadmins: SuperadminConfig {
                ids: superadmins,
                bypass: SuperadminBypass {
                    positions: flag("WARDEN_POSITION_BYPASS", default.superadmins.bypass.positions),
                    ..default.superadmins.bypass
                },
            },
            teams: TeamConfig {
                enabled: flag("WARDEN_TEAMS_ENABLED", default.teams.enabled),
                scoping: if flag("WARDEN_TEAMS_STRICT", true) {
                    TeamScoping::Strict
                } else {
                    TeamScoping::Permissive
                },
            },
            invalidation: if flag("WARDEN_EAGER_INVALIDATION", true) {
                InvalidationPolicy::Eager
            } else {
                InvalidationPolicy::Lazy
            },
            tables: default.tables,
        };

        config.validate()?;
        Ok(config)
    }

    /// Enable team scoping.
    pub fn with_teams(mut self, scoping: TeamScoping) -> Self {
        self.teams = TeamConfig {
            enabled: true,
            scoping,
        };
        self
    }

    /// Add a superadmin.
    pub fn with_superadmin(mut self, principal_id: Uuid) -> Self {
        self.superadmins.ids.insert(principal_id);
        self
    }

    /// Set the indirect invalidation policy.
    pub fn with_invalidation(mut self, policy: InvalidationPolicy) -> Self {
        self.invalidation = policy;
        self
    }

    /// Set the cache failure policy.
    pub fn with_cache_failure_policy(mut self, policy: CacheFailurePolicy) -> Self {
        self.cache.failure_policy = policy;
        self
    }

    /// Disable caching.
    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(ConfigError::invalid(
                "WARDEN_CACHE_TTL_SECS",
                "must be positive while caching is enabled",
            ));
        }
        if self.cache.key_prefix.is_empty() {
            return Err(ConfigError::invalid("WARDEN_CACHE_PREFIX", "must not be empty"));
        }
        if self.cache.key_prefix.contains(char::is_whitespace) {
            return Err(ConfigError::invalid(
                "WARDEN_CACHE_PREFIX",
                "must not contain whitespace",
            ));
        }
        self.tables.validate()
    }
}

fn parse_ids(raw: &str) -> Result<HashSet<Uuid>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s).map_err(|e| {
                ConfigError::invalid("WARDEN_SUPERADMINS", format!("'{}': {}", s, e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert_eq!(config.cache.failure_policy, CacheFailurePolicy::FailOpen);
        assert_eq!(config.cache.key_prefix, "warden");
        assert!(config.superadmins.ids.is_empty());
        assert!(!config.teams.enabled);
        assert_eq!(config.teams.scoping, TeamScoping::Strict);
        assert_eq!(config.invalidation, InvalidationPolicy::Eager);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_superadmin_bypass_skips_positions() {
        let admin = Uuid::now_v7();
        let config = EngineConfig::default().with_superadmin(admin);

        assert!(config.superadmins.bypasses(admin, CheckTarget::Roles));
        assert!(config.superadmins.bypasses(admin, CheckTarget::Permissions));
        assert!(!config.superadmins.bypasses(admin, CheckTarget::Positions));
        assert!(!config.superadmins.bypasses(Uuid::now_v7(), CheckTarget::Roles));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let admin = Uuid::now_v7();
        let other = Uuid::now_v7();
        let admins = format!("{}, {}", admin, other);
        let config = EngineConfig::from_lookup(lookup(&[
            ("WARDEN_CACHE_ENABLED", "0"),
            ("WARDEN_CACHE_TTL_SECS", "300"),
            ("WARDEN_CACHE_FAIL_CLOSED", "true"),
            ("WARDEN_CACHE_PREFIX", "acme"),
            ("WARDEN_SUPERADMINS", &admins),
            ("WARDEN_POSITION_BYPASS", "1"),
            ("WARDEN_TEAMS_ENABLED", "true"),
            ("WARDEN_TEAMS_STRICT", "false"),
            ("WARDEN_EAGER_INVALIDATION", "false"),
        ]))
        .unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.cache.failure_policy, CacheFailurePolicy::FailClosed);
        assert_eq!(config.cache.key_prefix, "acme");
        assert_eq!(config.superadmins.ids.len(), 2);
        assert!(config.superadmins.bypasses(other, CheckTarget::Positions));
        assert!(config.teams.enabled);
        assert_eq!(config.teams.scoping, TeamScoping::Permissive);
        assert_eq!(config.invalidation, InvalidationPolicy::Lazy);
    }

    #[test]
    fn test_from_lookup_falls_back_on_unparsable_numbers() {
        let config = EngineConfig::from_lookup(lookup(&[("WARDEN_CACHE_TTL_SECS", "soon")])).unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
    }

    #[test]
    fn test_from_lookup_rejects_bad_superadmin() {
        let result = EngineConfig::from_lookup(lookup(&[("WARDEN_SUPERADMINS", "1")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "WARDEN_SUPERADMINS"
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = EngineConfig::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());

        let config = config.without_cache();
        assert!(config.validate().is_ok());

        let mut config = EngineConfig::default();
        config.cache.key_prefix = "my app".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_names() {
        let tables = TableNames::default();
        assert_eq!(tables.for_relation(RelationKind::RolePermission), "permission_role");
        assert_eq!(tables.for_entity(EntityKind::Team), Some("teams"));
        assert_eq!(tables.for_entity(EntityKind::Principal), None);
        assert!(tables.validate().is_ok());
    }

    #[test]
    fn test_validate_table_names() {
        let mut config = EngineConfig::default();
        config.tables.teams.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "tables.teams"
        ));

        let mut config = EngineConfig::default();
        config.tables.role_permission = config.tables.roles.clone();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "tables.role_permission"
        ));
    }
}
