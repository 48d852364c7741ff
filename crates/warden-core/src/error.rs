//! Error types for engine operations
//!
//! Authorization outcomes are booleans; these errors cover lookups that do
//! not resolve, invalid mutations, and faults in the store or cache.

use crate::config::ConfigError;
use thiserror::Error;
use warden_model::{EntityKind, HolderKind, RelationKind};

/// Engine error types.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced entity does not exist
    #[error("{kind} not found: {reference}")]
    NotFound {
        /// Kind that was looked up
        kind: EntityKind,
        /// ID or quoted name that was looked up
        reference: String,
    },

    /// The cache store faulted and the failure policy is fail-closed
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The repository faulted
    #[error("Repository error: {0}")]
    Repository(String),

    /// The holder cannot hold entities of this kind
    #[error("Invalid relation: {holder} cannot hold {related}")]
    InvalidRelation {
        /// Holder kind
        holder: HolderKind,
        /// Related kind
        related: EntityKind,
    },

    /// A team was given for a relation that is not team-scoped
    #[error("Relation {0} is not team-scoped")]
    TeamNotAllowed(RelationKind),

    /// Another entity of the kind already uses the name
    #[error("{kind} named '{name}' already exists")]
    DuplicateName {
        /// Entity kind
        kind: EntityKind,
        /// Conflicting name
        name: String,
    },

    /// The entity kind has no record managed by the engine
    #[error("Entities of kind {0} are not managed by the engine")]
    Unmanaged(EntityKind),

    /// A before-hook cancelled the operation
    #[error("Operation aborted: {reason}")]
    Aborted {
        /// Reason given by the hook
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Build a `NotFound` for any displayable reference.
    pub fn not_found(kind: EntityKind, reference: impl std::fmt::Display) -> Self {
        EngineError::NotFound {
            kind,
            reference: reference.to_string(),
        }
    }

    /// Check if this error should be logged at error level.
    ///
    /// Caller mistakes such as unknown names are expected and
    /// should not be logged as errors.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            EngineError::CacheUnavailable(_) | EngineError::Repository(_) | EngineError::Config(_)
        )
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            EngineError::Repository(_) => "REPOSITORY_ERROR",
            EngineError::InvalidRelation { .. } => "INVALID_RELATION",
            EngineError::TeamNotAllowed(_) => "TEAM_NOT_ALLOWED",
            EngineError::DuplicateName { .. } => "DUPLICATE_NAME",
            EngineError::Unmanaged(_) => "UNMANAGED_KIND",
            EngineError::Aborted { .. } => "ABORTED",
            EngineError::Config(_) => "CONFIG_ERROR",
        }
    }
}
