//! Post-commit event bus
//!
//! Status changes are announced on a `tokio::sync::broadcast` channel once
//! they have been persisted. Publishing never blocks and never fails, so a
//! slow or broken notification path cannot undo or delay a committed change.
//!
//! ```text
//! StatusService ──▶ EventBus::publish() ──▶ broadcast channel ──▶ NotificationDispatcher ──▶ Notifier
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = EventBus::new(1024);
//! let mut rx = bus.subscribe();
//!
//! bus.publish(OrderEvent::OrderCompleted { order_id, recipient_id });
//!
//! if let Ok(envelope) = rx.recv().await {
//!     println!("{} for {}", envelope.event.kind(), envelope.event.order_id());
//! }
//! ```

use crate::status::StatusDimension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Something a counterpart should hear about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderEvent {
    /// A status dimension of the order changed
    StatusChanged {
        order_id: Uuid,
        dimension: StatusDimension,
        previous: String,
        new: String,
        actor_id: Uuid,
        /// Who should be told, when anyone
        recipient_id: Option<Uuid>,
        message: String,
    },
    /// The order entered active fulfillment
    FulfillmentRequested {
        order_id: Uuid,
        recipient_id: Option<Uuid>,
        reference_id: String,
    },
    /// The order reached a successful final state
    OrderCompleted {
        order_id: Uuid,
        recipient_id: Option<Uuid>,
    },
}

impl OrderEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::StatusChanged { .. } => "status_changed",
            OrderEvent::FulfillmentRequested { .. } => "fulfillment_requested",
            OrderEvent::OrderCompleted { .. } => "order_completed",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::StatusChanged { order_id, .. }
            | OrderEvent::FulfillmentRequested { order_id, .. }
            | OrderEvent::OrderCompleted { order_id, .. } => *order_id,
        }
    }

    pub fn recipient_id(&self) -> Option<Uuid> {
        match self {
            OrderEvent::StatusChanged { recipient_id, .. }
            | OrderEvent::FulfillmentRequested { recipient_id, .. }
            | OrderEvent::OrderCompleted { recipient_id, .. } => *recipient_id,
        }
    }
}

/// Envelope wrapping an event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    pub event: OrderEvent,
}

impl EventEnvelope {
    pub fn new(event: OrderEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone and shareable across tasks.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// The capacity determines how many events can be buffered before
    /// slow receivers start losing events (lagged).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of receivers that will receive the event.
    pub fn publish(&self, event: OrderEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        // send() returns Err only if there are no receivers, which is fine
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
