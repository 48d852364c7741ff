//! Event types for audit and webhook consumers
//!
//! Every relation mutation and lifecycle operation produces one
//! [`MutationEvent`], wrapped in an [`Event`] envelope for delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use warden_model::{Entity, EntityKind, HolderRef, SyncChanges};

/// Closed set of event kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A relation tuple was attached
    Attached,
    /// A relation tuple was detached
    Detached,
    /// A relation set was replaced
    Synced,
    /// An entity was created or updated
    Saved,
    /// An entity was deleted or soft-deleted
    Deleted,
    /// A soft-deleted entity was restored
    Restored,
}

impl EventKind {
    /// Get the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Attached => "attached",
            EventKind::Detached => "detached",
            EventKind::Synced => "synced",
            EventKind::Saved => "saved",
            EventKind::Deleted => "deleted",
            EventKind::Restored => "restored",
        }
    }
}

/// Event envelope.
///
/// All events are wrapped in this envelope which provides metadata
/// for routing, tracing, and auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event kind
    pub kind: EventKind,

    /// Kind of the entity the event is about
    pub subject_kind: EntityKind,

    /// ID of the entity the event is about
    pub subject_id: Uuid,

    /// Event type (e.g., "permission.attached", "saved")
    pub event_type: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Correlation ID for tracing
    pub correlation_id: Option<String>,

    /// Event version for schema evolution
    pub version: u32,

    /// Event payload
    pub payload: serde_json::Value,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create a new event.
    pub fn new(
        kind: EventKind,
        subject_kind: EntityKind,
        subject_id: Uuid,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            subject_kind,
            subject_id,
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            version: 1,
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Set correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get the topic for this event.
    ///
    /// Topics are structured as: `{subject_kind}.{event_type}`
    pub fn topic(&self) -> String {
        format!("{}.{}", self.subject_kind.as_str(), self.event_type)
    }

    /// Parse the payload back into the typed event.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Relation and lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationEvent {
    /// A related entity was attached to a holder
    Attached {
        holder: HolderRef,
        related_kind: EntityKind,
        related_id: Uuid,
        team_id: Option<Uuid>,
    },
    /// A related entity was detached from a holder
    Detached {
        holder: HolderRef,
        related_kind: EntityKind,
        related_id: Uuid,
        team_id: Option<Uuid>,
    },
    /// A holder's relation set was replaced
    Synced {
        holder: HolderRef,
        related_kind: EntityKind,
        team_id: Option<Uuid>,
        changes: SyncChanges,
    },
    /// An entity was saved
    Saved { entity: Entity },
    /// An entity was deleted
    Deleted {
        kind: EntityKind,
        id: Uuid,
        soft: bool,
    },
    /// An entity was restored from soft-delete
    Restored { kind: EntityKind, id: Uuid },
}

impl MutationEvent {
    /// Event kind.
    pub fn kind(&self) -> EventKind {
        match self {
            MutationEvent::Attached { .. } => EventKind::Attached,
            MutationEvent::Detached { .. } => EventKind::Detached,
            MutationEvent::Synced { .. } => EventKind::Synced,
            MutationEvent::Saved { .. } => EventKind::Saved,
            MutationEvent::Deleted { .. } => EventKind::Deleted,
            MutationEvent::Restored { .. } => EventKind::Restored,
        }
    }

    /// Kind and ID of the entity the event is about.
    pub fn subject(&self) -> (EntityKind, Uuid) {
        match self {
            MutationEvent::Attached { holder, .. }
            | MutationEvent::Detached { holder, .. }
            | MutationEvent::Synced { holder, .. } => (holder.kind.entity_kind(), holder.id),
            MutationEvent::Saved { entity } => (entity.kind, entity.id),
            MutationEvent::Deleted { kind, id, .. } | MutationEvent::Restored { kind, id } => {
                (*kind, *id)
            }
        }
    }

    /// Event type string, e.g. `permission.attached` or `saved`.
    pub fn event_type(&self) -> String {
        match self {
            MutationEvent::Attached { related_kind, .. }
            | MutationEvent::Detached { related_kind, .. }
            | MutationEvent::Synced { related_kind, .. } => {
                format!("{}.{}", related_kind.as_str(), self.kind().as_str())
            }
            _ => self.kind().as_str().to_string(),
        }
    }

    /// Convert to generic event.
    pub fn to_event(&self) -> Event {
        let (subject_kind, subject_id) = self.subject();
        let payload = serde_json::to_value(self).unwrap_or_default();
        Event::new(self.kind(), subject_kind, subject_id, self.event_type(), payload)
    }
}
