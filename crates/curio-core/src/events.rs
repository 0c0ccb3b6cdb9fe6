//! Server event types and event bus for the realtime change feed.
//!
//! The pipeline emits an event on every applied state transition and merge;
//! downstream consumers (the SSE endpoint, telemetry) subscribe
//! independently. The UI reconciles its asset list from these events plus a
//! periodic fallback poll for anything stuck in a non-terminal state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{new_v7, ProcessingStatus, TranscriptStatus};

/// Domain events published to the realtime feed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A raw provider event was appended to the event store.
    EventStored {
        provider_event_id: String,
        event_type: String,
    },
    /// An asset's persisted state changed (any pipeline transition).
    AssetUpdated {
        user_id: Uuid,
        asset_id: Uuid,
        processing_status: ProcessingStatus,
        transcript_status: Option<TranscriptStatus>,
    },
    /// The merge engine persisted derived inventory items.
    ItemsMerged {
        user_id: Uuid,
        asset_id: Uuid,
        item_count: usize,
    },
}

impl ServerEvent {
    /// Namespaced event type used on the SSE wire (e.g. `"asset.updated"`).
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::EventStored { .. } => "webhook.stored",
            ServerEvent::AssetUpdated { .. } => "asset.updated",
            ServerEvent::ItemsMerged { .. } => "items.merged",
        }
    }

    /// The owning user, when the event is user-scoped.
    ///
    /// `EventStored` predates identity resolution and has no owner; the SSE
    /// feed does not deliver it to user-filtered subscribers.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            ServerEvent::EventStored { .. } => None,
            ServerEvent::AssetUpdated { user_id, .. } => Some(*user_id),
            ServerEvent::ItemsMerged { user_id, .. } => Some(*user_id),
        }
    }
}

/// Versioned envelope wrapping every emitted event.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// UUIDv7 event id (time-ordered).
    pub event_id: Uuid,
    /// Namespaced event type, duplicated from the payload for routing.
    pub event_type: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub payload: ServerEvent,
}

impl EventEnvelope {
    pub fn new(payload: ServerEvent) -> Self {
        Self {
            event_id: new_v7(),
            event_type: payload.event_type(),
            occurred_at: Utc::now(),
            payload,
        }
    }
}

/// Broadcast bus fanning events out to all subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// the database remains the source of truth, the feed is advisory.
    pub fn emit(&self, event: ServerEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events. Each subscriber gets its own
    /// independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        let user_id = Uuid::new_v4();
        let asset_id = Uuid::new_v4();
        bus.emit(ServerEvent::AssetUpdated {
            user_id,
            asset_id,
            processing_status: ProcessingStatus::Ready,
            transcript_status: Some(TranscriptStatus::Pending),
        });

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "asset.updated");
        assert_eq!(envelope.payload.user_id(), Some(user_id));
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(32);
        // No subscriber; must not panic or error.
        bus.emit(ServerEvent::EventStored {
            provider_event_id: "evt_1".to_string(),
            event_type: "video.asset.ready".to_string(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_stored_has_no_owner() {
        let event = ServerEvent::EventStored {
            provider_event_id: "evt_1".to_string(),
            event_type: "video.asset.ready".to_string(),
        };
        assert_eq!(event.user_id(), None);
        assert_eq!(event.event_type(), "webhook.stored");
    }

    #[test]
    fn test_envelope_ids_are_time_ordered() {
        let a = EventEnvelope::new(ServerEvent::EventStored {
            provider_event_id: "evt_a".to_string(),
            event_type: "t".to_string(),
        });
        let b = EventEnvelope::new(ServerEvent::EventStored {
            provider_event_id: "evt_b".to_string(),
            event_type: "t".to_string(),
        });
        assert!(a.event_id <= b.event_id);
    }
}
