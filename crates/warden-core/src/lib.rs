//! # Warden Core
//!
//! Permission resolution, caching, and relation mutation for role, position,
//! and permission based access control.
//!
//! ## Overview
//!
//! The warden-core crate handles:
//! - **Authorization**: Checks of roles, positions, or permissions with AND/OR
//!   semantics, wildcard permission names, team scoping, and superadmin bypass
//! - **Permission Cache**: Per-holder resolved grants with TTL and explicit invalidation
//! - **Relation Mutation**: Attach, detach, and sync with cache invalidation and events
//! - **Lifecycle**: Save, soft or force delete, and restore with before/after hooks
//! - **Gate**: String-encoded route arguments mapped to `Allow`/`Deny`
//!
//! ## Data Flow
//!
//! ```text
//! Gate ──→ authorize ──→ PermissionCache ──(miss)──→ Repository
//! attach/detach/sync ──→ Repository (write) ──→ PermissionCache (invalidate) ──→ EventSink
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use warden_core::{AccessEngine, EngineConfig, Gate, GateRequest, MemoryRepository, TeamScoping};
//! use warden_events::MemoryEventSink;
//! use warden_model::{CheckTarget, Entity, EntityKind, Principal, Role};
//!
//! async fn example() -> warden_core::EngineResult<()> {
//!     let sink = MemoryEventSink::new();
//!     let engine = AccessEngine::builder(Arc::new(MemoryRepository::new()))
//!         .with_config(EngineConfig::default().with_teams(TeamScoping::Strict))
//!         .with_event_sink(Arc::new(sink.clone()))
//!         .build()?;
//!
//!     engine.save(Entity::team("blog")).await?;
//!     let editor = engine.save(Entity::role("editor")).await?;
//!     engine.save(Entity::permission("posts.*")).await?;
//!     engine
//!         .attach(&Role::new(editor.id), EntityKind::Permission, "posts.*", None)
//!         .await?;
//!
//!     let alice = Principal::new(uuid::Uuid::now_v7());
//!     engine
//!         .attach(&alice, EntityKind::Role, "editor", Some("blog".into()))
//!         .await?;
//!
//!     let gate = Gate::new(Arc::new(engine));
//!     let request = GateRequest::parse(CheckTarget::Permissions, "posts.edit", Some("blog"), "");
//!     assert!(gate.check(alice, &request).await.is_allowed());
//!     Ok(())
//! }
//! ```

pub mod authorize;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod memory;
pub mod mutator;
pub mod repository;

#[cfg(feature = "redis")]
pub mod redis;

// Re-export main types
pub use authorize::{evaluate, Check};
pub use cache::{CacheError, CacheStore, MemoryCacheStore, PermissionCache};
pub use config::{
    CacheConfig, CacheFailurePolicy, ConfigError, EngineConfig, InvalidationPolicy, SuperadminBypass,
    SuperadminConfig, TableNames, TeamConfig, TeamScoping,
};
pub use engine::{AccessEngine, EngineBuilder};
pub use error::{EngineError, EngineResult};
pub use gate::{Decision, Gate, GateRequest};
pub use lifecycle::DeleteMode;
pub use memory::MemoryRepository;
pub use repository::Repository;

#[cfg(feature = "redis")]
pub use self::redis::RedisCacheStore;
