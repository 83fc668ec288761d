//! In-process publisher over a tokio broadcast channel.
//!
//! Every subscriber gets its own copy of each envelope. Slow subscribers
//! lag and lose the oldest envelopes rather than blocking writers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::publisher::{EventPublisher, PublishError, TransactionLoggedEvent};

/// An event plus delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventEnvelope {
    /// Unique, time-ordered id of this delivery.
    pub event_id: Uuid,
    /// Routing key the event was published under.
    pub routing_key: String,
    /// When the envelope was handed to the channel.
    pub published_at: DateTime<Utc>,
    /// The event itself.
    pub event: TransactionLoggedEvent,
}

/// Lossy in-process fan-out publisher.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<EventEnvelope>,
}

impl BroadcastPublisher {
    /// Creates a publisher buffering up to `capacity` envelopes per subscriber.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Opens a new subscription. It sees envelopes published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(
        &self,
        event: &TransactionLoggedEvent,
        routing_key: &str,
    ) -> Result<(), PublishError> {
        let envelope = EventEnvelope {
            event_id: Uuid::now_v7(),
            routing_key: routing_key.to_string(),
            published_at: Utc::now(),
            event: event.clone(),
        };
        self.sender
            .send(envelope)
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers(routing_key.to_string()))
    }
}
