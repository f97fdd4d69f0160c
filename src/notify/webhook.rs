//! Webhook transport, POSTing one JSON document per notification

use super::Notifier;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use uuid::Uuid;

pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build webhook client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn post(&self, body: Value) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Webhook POST to {} failed", self.endpoint))?
            .error_for_status()
            .context("Webhook endpoint rejected the notification")?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_status_update(
        &self,
        order_id: Uuid,
        recipient_id: Uuid,
        new_status: &str,
        message: &str,
    ) -> Result<()> {
        self.post(json!({
            "type": "status_update",
            "order_id": order_id,
            "recipient_id": recipient_id,
            "new_status": new_status,
            "message": message,
        }))
        .await
    }

    async fn notify_fulfillment_request(
        &self,
        order_id: Uuid,
        recipient_id: Uuid,
        reference_id: &str,
    ) -> Result<()> {
        self.post(json!({
            "type": "fulfillment_request",
            "order_id": order_id,
            "recipient_id": recipient_id,
            "reference_id": reference_id,
        }))
        .await
    }

    async fn notify_order_completion(&self, order_id: Uuid, recipient_id: Uuid) -> Result<()> {
        self.post(json!({
            "type": "order_completion",
            "order_id": order_id,
            "recipient_id": recipient_id,
        }))
        .await
    }
}
