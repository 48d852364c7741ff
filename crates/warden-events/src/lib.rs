//! # Warden Events
//!
//! Typed mutation events and the sink contract the Warden engine emits into.
//!
//! ## Overview
//!
//! The warden-events crate handles:
//! - **Event Types**: A closed set of mutation events (`Attached`, `Detached`,
//!   `Synced`, `Saved`, `Deleted`, `Restored`) parameterized by subject kind
//! - **Event Sinks**: Injected destinations for audit and webhook consumers
//! - **Lifecycle Hooks**: Before/after hooks bracketing save, delete, and restore
//!
//! ## Usage
//!
//! ```rust,no_run
//! use uuid::Uuid;
//! use warden_events::{EventSink, MemoryEventSink, MutationEvent};
//! use warden_model::{EntityKind, HolderKind, HolderRef};
//!
//! async fn example() {
//!     let sink = MemoryEventSink::new();
//!     let mut sub = sink.subscribe("role.permission.*").await;
//!
//!     let event = MutationEvent::Attached {
//!         holder: HolderRef::new(HolderKind::Role, Uuid::now_v7()),
//!         related_kind: EntityKind::Permission,
//!         related_id: Uuid::now_v7(),
//!         team_id: None,
//!     };
//!     sink.emit(event.to_event()).await.unwrap();
//!
//!     let received = sub.recv().await.unwrap();
//!     assert_eq!(received.topic(), "role.permission.attached");
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are structured as `{subject_kind}.{event_type}`:
//! - `role.permission.attached` - Permission attached to a role
//! - `principal.role.synced` - Principal's roles replaced
//! - `position.deleted` - Position deleted
//!
//! Wildcards:
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments

pub mod hooks;
pub mod sink;
pub mod types;

// Re-export main types
pub use hooks::{HookDecision, HookError, LifecycleContext, LifecycleHook, LifecycleStage};
pub use sink::{
    EventSink, FanoutEventSink, MemoryEventSink, NullEventSink, SinkError, SinkResult, SinkStats,
    Subscription, TracingEventSink,
};
pub use types::{Event, EventKind, MutationEvent};
