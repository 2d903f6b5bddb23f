//! Domain-change event publishing over a broadcast channel.
//!
//! Events are emitted after successful writes only. Publishing is
//! fire-and-forget: a send with zero subscribers succeeds, and a slow
//! subscriber lagging past the channel capacity drops its oldest events
//! rather than blocking the write path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// The write that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Inserted,
    Updated,
    Deleted,
}

impl ChangeOperation {
    /// Wire-level event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            ChangeOperation::Inserted => "record_inserted",
            ChangeOperation::Updated => "record_updated",
            ChangeOperation::Deleted => "record_deleted",
        }
    }
}

/// A domain-change notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub entity: String,
    pub record_id: Option<Value>,
    pub operation: ChangeOperation,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl ChangeEvent {
    pub fn new(
        entity: impl Into<String>,
        record_id: Option<Value>,
        operation: ChangeOperation,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            entity: entity.into(),
            record_id,
            operation,
            occurred_at: chrono::Utc::now(),
        }
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event channel is closed")]
    ChannelClosed,
}

/// Broadcast publisher for domain-change events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Zero subscribers is a success: events exist for
    /// whoever cares to listen, the write path never depends on them.
    pub fn publish(&self, event: ChangeEvent) -> Result<(), PublishError> {
        match self.sender.send(event) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let publisher = EventPublisher::new(8);
        let event = ChangeEvent::new("widget", Some(json!(1)), ChangeOperation::Inserted);
        assert!(publisher.publish(event).is_ok());
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let publisher = EventPublisher::new(8);
        let mut receiver = publisher.subscribe();

        publisher
            .publish(ChangeEvent::new(
                "widget",
                Some(json!(42)),
                ChangeOperation::Updated,
            ))
            .unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.entity, "widget");
        assert_eq!(event.record_id, Some(json!(42)));
        assert_eq!(event.operation, ChangeOperation::Updated);
        assert_eq!(event.operation.event_name(), "record_updated");
    }

    #[tokio::test]
    async fn test_subscriber_count() {
        let publisher = EventPublisher::new(8);
        assert_eq!(publisher.subscriber_count(), 0);
        let _receiver = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ChangeOperation::Inserted.event_name(), "record_inserted");
        assert_eq!(ChangeOperation::Updated.event_name(), "record_updated");
        assert_eq!(ChangeOperation::Deleted.event_name(), "record_deleted");
    }
}
