//! Event sink implementation
//!
//! This module provides the sink abstraction the engine emits into, and
//! implementations for recording, logging, and discarding events.

use crate::types::{Event, EventKind};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

/// Event sink error types.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Failed to deliver event
    #[error("Failed to deliver event: {0}")]
    DeliveryError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for event sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Subscription handle for receiving events.
pub struct Subscription {
    /// Subscription ID
    pub id: String,
    /// Topic pattern
    pub topic: String,
    /// Event receiver
    pub receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event.
    pub async fn recv(&mut self) -> SinkResult<Event> {
        self.receiver
            .recv()
            .await
            .map_err(|_| SinkError::ChannelClosed)
    }

    /// Receive the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

/// Destination for mutation events.
///
/// Emission happens after the mutation has committed and the cache has been
/// invalidated. A failing sink never undoes either.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emit an event.
    async fn emit(&self, event: Event) -> SinkResult<()>;
}

/// Event sink statistics.
#[derive(Debug, Clone, Default)]
pub struct SinkStats {
    /// Total events emitted
    pub events_emitted: u64,
    /// Total deliveries to subscribers
    pub events_delivered: u64,
    /// Active subscriptions
    pub active_subscriptions: usize,
}

/// Events a [`MemoryEventSink`] keeps by default before dropping the oldest.
pub const DEFAULT_RETAINED_EVENTS: usize = 10_000;

/// In-memory event sink.
///
/// Records events and fans them out to topic subscriptions. History is
/// bounded: once `retained` events are held, the oldest is dropped.
/// Suitable for single-process applications and testing.
#[derive(Clone)]
pub struct MemoryEventSink {
    /// Recorded events, oldest first
    events: Arc<RwLock<VecDeque<Event>>>,
    /// Maximum recorded events
    retained: usize,
    /// Topic subscribers
    subscribers: Arc<RwLock<HashMap<String, broadcast::Sender<Event>>>>,
    /// Statistics
    stats: Arc<RwLock<SinkStats>>,
    /// Default channel capacity
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventSink")
            .field("channel_capacity", &self.channel_capacity)
            .field("retained", &self.retained)
            .finish()
    }
}

impl MemoryEventSink {
    /// Create a new in-memory event sink.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            retained: DEFAULT_RETAINED_EVENTS,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(SinkStats::default())),
            channel_capacity: capacity,
        }
    }

    /// Set how many events are recorded before the oldest is dropped.
    pub fn with_retention(mut self, retained: usize) -> Self {
        self.retained = retained.max(1);
        self
    }

    /// Check if a topic matches a pattern.
    ///
    /// - `*` matches exactly one segment
    /// - `#` matches zero or more segments
    pub fn topic_matches(pattern: &str, topic: &str) -> bool {
        let pattern_parts: Vec<&str> = pattern.split('.').collect();
        let topic_parts: Vec<&str> = topic.split('.').collect();
        Self::segments_match(&pattern_parts, &topic_parts)
    }

    fn segments_match(pattern: &[&str], topic: &[&str]) -> bool {
        match pattern.split_first() {
            None => topic.is_empty(),
            Some((&"#", rest)) => {
                (0..=topic.len()).any(|skip| Self::segments_match(rest, &topic[skip..]))
            }
            Some((&segment, rest)) => match topic.split_first() {
                Some((&head, tail)) if segment == "*" || segment == head => {
                    Self::segments_match(rest, tail)
                }
                _ => false,
            },
        }
    }

    /// Subscribe to a topic pattern.
    ///
    /// Examples:
    /// - `role.permission.*` matches `role.permission.attached`, `role.permission.synced`
    /// - `*.#` matches everything
    pub async fn subscribe(&self, topic: &str) -> Subscription {
        let id = uuid::Uuid::now_v7().to_string();

        let receiver = {
            let mut subscribers = self.subscribers.write().await;

            if let Some(sender) = subscribers.get(topic) {
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(self.channel_capacity);
                subscribers.insert(topic.to_string(), sender);
                receiver
            }
        };

        Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        }
    }

    /// All recorded events, oldest first.
    pub async fn events(&self) -> Vec<Event> {
        self.events.read().await.iter().cloned().collect()
    }

    /// Recorded events of one kind, oldest first.
    pub async fn events_of(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Remove and return every recorded event.
    pub async fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.write().await).into()
    }

    /// Get sink stats. `active_subscriptions` counts live receivers.
    pub async fn stats(&self) -> SinkStats {
        let mut stats = self.stats.read().await.clone();
        stats.active_subscriptions = self
            .subscribers
            .read()
            .await
            .values()
            .map(|sender| sender.receiver_count())
            .sum();
        stats
    }
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn emit(&self, event: Event) -> SinkResult<()> {
        let topic = event.topic();

        let mut delivered = 0;
        {
            let mut subscribers = self.subscribers.write().await;
            subscribers.retain(|_, sender| sender.receiver_count() > 0);
            for (pattern, sender) in subscribers.iter() {
                if Self::topic_matches(pattern, &topic) && sender.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        {
            let mut events = self.events.write().await;
            if events.len() >= self.retained {
                events.pop_front();
            }
            events.push_back(event);
        }

        let mut stats = self.stats.write().await;
        stats.events_emitted += 1;
        stats.events_delivered += delivered;

        Ok(())
    }
}

/// Sink that writes each event as a structured `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) -> SinkResult<()> {
        let payload = serde_json::to_string(&event.payload)
            .map_err(|e| SinkError::SerializationError(e.to_string()))?;

        tracing::info!(
            target: "warden::audit",
            event_id = %event.id,
            topic = %event.topic(),
            subject_id = %event.subject_id,
            correlation_id = ?event.correlation_id,
            payload = %payload,
            "Access control mutation"
        );

        Ok(())
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event: Event) -> SinkResult<()> {
        Ok(())
    }
}

/// Sink that forwards every event to several sinks.
///
/// Every sink is tried; the first error is returned after all have run.
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    /// Create an empty fanout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl EventSink for FanoutEventSink {
    async fn emit(&self, event: Event) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event.clone()).await {
                tracing::warn!(error = %e, topic = %event.topic(), "Event sink failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MutationEvent;
    use uuid::Uuid;
    use warden_model::{EntityKind, HolderKind, HolderRef};

    fn attached(kind: HolderKind) -> Event {
        MutationEvent::Attached {
            holder: HolderRef::new(kind, Uuid::now_v7()),
            related_kind: EntityKind::Permission,
            related_id: Uuid::now_v7(),
            team_id: None,
        }
        .to_event()
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn emit(&self, _event: Event) -> SinkResult<()> {
            Err(SinkError::DeliveryError("webhook down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_memory_sink_records_and_delivers() {
        let sink = MemoryEventSink::new();
        let mut sub = sink.subscribe("role.permission.*").await;

        sink.emit(attached(HolderKind::Role)).await.unwrap();
        sink.emit(attached(HolderKind::Position)).await.unwrap();

        let received = sub.try_recv().unwrap();
        assert_eq!(received.topic(), "role.permission.attached");
        assert!(sub.try_recv().is_none());

        assert_eq!(sink.events().await.len(), 2);
        let stats = sink.stats().await;
        assert_eq!(stats.events_emitted, 2);
        assert_eq!(stats.events_delivered, 1);
        assert_eq!(stats.active_subscriptions, 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_subscriptions_tracked() {
        let sink = MemoryEventSink::new().with_retention(2);
        let sub = sink.subscribe("#").await;
        let other = sink.subscribe("role.#").await;
        assert_eq!(sink.stats().await.active_subscriptions, 2);

        let events: Vec<Event> = (0..3).map(|_| attached(HolderKind::Role)).collect();
        for event in &events {
            sink.emit(event.clone()).await.unwrap();
        }
        let kept: Vec<_> = sink.events().await.iter().map(|e| e.id).collect();
        assert_eq!(kept, vec![events[1].id, events[2].id]);
        assert_eq!(sink.stats().await.events_emitted, 3);

        drop(sub);
        drop(other);
        assert_eq!(sink.stats().await.active_subscriptions, 0);
    }

    #[tokio::test]
    async fn test_events_of_and_drain() {
        let sink = MemoryEventSink::new();
        sink.emit(attached(HolderKind::Role)).await.unwrap();
        sink.emit(
            MutationEvent::Restored {
                kind: EntityKind::Role,
                id: Uuid::now_v7(),
            }
            .to_event(),
        )
        .await
        .unwrap();

        assert_eq!(sink.events_of(EventKind::Attached).await.len(), 1);
        assert_eq!(sink.events_of(EventKind::Restored).await.len(), 1);
        assert_eq!(sink.drain().await.len(), 2);
        assert!(sink.events().await.is_empty());
    }

    #[test]
    fn test_topic_matching() {
        // Exact match
        assert!(MemoryEventSink::topic_matches("role.permission.attached", "role.permission.attached"));

        // Single wildcard
        assert!(MemoryEventSink::topic_matches("role.permission.*", "role.permission.attached"));
        assert!(MemoryEventSink::topic_matches("*.permission.attached", "position.permission.attached"));
        assert!(MemoryEventSink::topic_matches("role.*", "role.saved"));

        // Multi-segment wildcard
        assert!(MemoryEventSink::topic_matches("role.#", "role.permission.attached"));
        assert!(MemoryEventSink::topic_matches("#", "principal.role.synced"));
        assert!(MemoryEventSink::topic_matches("#.synced", "principal.role.synced"));
        assert!(MemoryEventSink::topic_matches("role.#", "role"));

        // Non-matches
        assert!(!MemoryEventSink::topic_matches("role.*", "role.permission.attached"));
        assert!(!MemoryEventSink::topic_matches("position.#", "role.saved"));
        assert!(!MemoryEventSink::topic_matches("role.permission.detached", "role.permission.attached"));
    }

    #[tokio::test]
    async fn test_fanout_continues_after_failure() {
        let memory = MemoryEventSink::new();
        let fanout = FanoutEventSink::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(Arc::new(memory.clone()));

        let result = fanout.emit(attached(HolderKind::Role)).await;
        assert!(matches!(result, Err(SinkError::DeliveryError(_))));
        assert_eq!(memory.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_null_and_tracing_sinks_accept_events() {
        assert!(NullEventSink.emit(attached(HolderKind::Role)).await.is_ok());
        assert!(TracingEventSink.emit(attached(HolderKind::Role)).await.is_ok());
    }
}
