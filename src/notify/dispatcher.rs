//! Background task that drains the event bus into a [`Notifier`]

use super::Notifier;
use crate::core::events::{EventBus, EventEnvelope, OrderEvent};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Subscribe to `bus` and run the dispatch loop on a new task
    ///
    /// The task ends once every `EventBus` clone has been dropped.
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<()> {
        let rx = bus.subscribe();
        tokio::spawn(async move {
            self.run(rx).await;
        })
    }

    pub async fn run(&self, mut rx: broadcast::Receiver<EventEnvelope>) {
        tracing::debug!("Notification dispatch loop started");

        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if let Err(e) = self.deliver(&envelope.event).await {
                        tracing::warn!(
                            event_id = %envelope.id,
                            kind = envelope.event.kind(),
                            order_id = %envelope.event.order_id(),
                            error = %e,
                            "Notification delivery failed"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    tracing::warn!(count, "Notification dispatcher lagged, {} events skipped", count);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("EventBus closed, stopping notification dispatch loop");
                    break;
                }
            }
        }
    }

    /// Deliver one event; events without a recipient are dropped
    pub async fn deliver(&self, event: &OrderEvent) -> Result<()> {
        let Some(recipient_id) = event.recipient_id() else {
            tracing::debug!(
                kind = event.kind(),
                order_id = %event.order_id(),
                "No recipient for event, skipping notification"
            );
            return Ok(());
        };

        match event {
            OrderEvent::StatusChanged {
                order_id,
                new,
                message,
                ..
            } => {
                self.notifier
                    .notify_status_update(*order_id, recipient_id, new, message)
                    .await
            }
            OrderEvent::FulfillmentRequested {
                order_id,
                reference_id,
                ..
            } => {
                self.notifier
                    .notify_fulfillment_request(*order_id, recipient_id, reference_id)
                    .await
            }
            OrderEvent::OrderCompleted { order_id, .. } => {
                self.notifier
                    .notify_order_completion(*order_id, recipient_id)
                    .await
            }
        }
    }
}
