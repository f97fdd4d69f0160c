//! Fire-and-forget notification delivery
//!
//! The status service never calls a [`Notifier`] directly. It publishes on
//! the [`EventBus`](crate::core::events::EventBus) after commit, and the
//! [`NotificationDispatcher`] forwards events here on its own task.

pub mod dispatcher;
#[cfg(feature = "push")]
pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub use dispatcher::NotificationDispatcher;
#[cfg(feature = "push")]
pub use webhook::WebhookNotifier;

/// Outbound notification transport
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_status_update(
        &self,
        order_id: Uuid,
        recipient_id: Uuid,
        new_status: &str,
        message: &str,
    ) -> Result<()>;

    async fn notify_fulfillment_request(
        &self,
        order_id: Uuid,
        recipient_id: Uuid,
        reference_id: &str,
    ) -> Result<()>;

    async fn notify_order_completion(&self, order_id: Uuid, recipient_id: Uuid) -> Result<()>;
}

/// Writes notifications to the log; the default transport
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_status_update(
        &self,
        order_id: Uuid,
        recipient_id: Uuid,
        new_status: &str,
        message: &str,
    ) -> Result<()> {
        tracing::info!(
            order_id = %order_id,
            recipient_id = %recipient_id,
            new_status,
            message,
            "Status update notification"
        );
        Ok(())
    }

    async fn notify_fulfillment_request(
        &self,
        order_id: Uuid,
        recipient_id: Uuid,
        reference_id: &str,
    ) -> Result<()> {
        tracing::info!(
            order_id = %order_id,
            recipient_id = %recipient_id,
            reference_id,
            "Fulfillment request notification"
        );
        Ok(())
    }

    async fn notify_order_completion(&self, order_id: Uuid, recipient_id: Uuid) -> Result<()> {
        tracing::info!(
            order_id = %order_id,
            recipient_id = %recipient_id,
            "Order completion notification"
        );
        Ok(())
    }
}
