//! Lifecycle hooks bracketing save, delete, and restore.
//!
//! Before-hooks run ahead of any write and may abort the operation. After-hooks
//! run once the write has committed; their failures are logged by the engine
//! and never roll the write back. Hooks are not transactional.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_model::Entity;

/// Lifecycle operation being performed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    /// Create or update
    Save,
    /// Soft or force delete
    Delete,
    /// Clear a soft-delete tombstone
    Restore,
}

impl LifecycleStage {
    /// Get the string representation of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::Save => "save",
            LifecycleStage::Delete => "delete",
            LifecycleStage::Restore => "restore",
        }
    }
}

/// What a hook is told about the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleContext {
    /// Operation
    pub stage: LifecycleStage,
    /// Entity as it will be (save) or as it was (delete, restore)
    pub entity: Entity,
    /// Whether a delete bypasses soft-delete
    pub force: bool,
}

impl LifecycleContext {
    /// Create a context.
    pub fn new(stage: LifecycleStage, entity: Entity) -> Self {
        Self {
            stage,
            entity,
            force: false,
        }
    }

    /// Mark a delete as forced.
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Outcome of a before-hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Proceed with the operation
    Continue,
    /// Cancel the operation before any write
    Abort(String),
}

/// After-hook failure.
#[derive(Debug, Error)]
pub enum HookError {
    /// Hook could not complete
    #[error("Hook failed: {0}")]
    Failed(String),
}

/// Hook invoked around lifecycle operations.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// Called before any write.
    async fn before(&self, _ctx: &LifecycleContext) -> HookDecision {
        HookDecision::Continue
    }

    /// Called after the write committed.
    async fn after(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
        Ok(())
    }
}
