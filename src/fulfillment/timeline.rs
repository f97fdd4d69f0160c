//! Read-only projections of the status history logs

use crate::core::error::OrderflowResult;
use crate::orders::{HistoryLog, OrderRepository, StatusHistoryEntry};
use crate::status::{FulfillmentStatus, OrderStatus, StatusMachine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

const UNKNOWN_STATUS: &str = "Unknown status.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub description: &'static str,
    pub notes: Option<String>,
    pub previous_status: Option<String>,
    pub changed_by: Option<Uuid>,
}

fn describe<S: StatusMachine>(status: &str) -> &'static str {
    status
        .parse::<S>()
        .map(S::description)
        .unwrap_or(UNKNOWN_STATUS)
}

fn project(log: HistoryLog, entries: Vec<StatusHistoryEntry>) -> Vec<TimelineEntry> {
    entries
        .into_iter()
        .map(|entry| {
            let description = match log {
                HistoryLog::Order => describe::<OrderStatus>(&entry.new_status),
                HistoryLog::Fulfillment => describe::<FulfillmentStatus>(&entry.new_status),
            };
            TimelineEntry {
                timestamp: entry.created_at,
                status: entry.new_status,
                description,
                notes: entry.notes,
                previous_status: entry.previous_status,
                changed_by: entry.changed_by,
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct TimelineProjector {
    repository: OrderRepository,
}

impl TimelineProjector {
    pub fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }

    /// Order status changes, oldest first
    ///
    /// An unknown order is `NotFound`; an order without history yields an
    /// empty list.
    pub async fn get_status_timeline(&self, order_id: Uuid) -> OrderflowResult<Vec<TimelineEntry>> {
        self.timeline(HistoryLog::Order, order_id).await
    }

    /// Fulfillment status changes, oldest first
    pub async fn get_fulfillment_history(
        &self,
        order_id: Uuid,
    ) -> OrderflowResult<Vec<TimelineEntry>> {
        self.timeline(HistoryLog::Fulfillment, order_id).await
    }

    async fn timeline(&self, log: HistoryLog, order_id: Uuid) -> OrderflowResult<Vec<TimelineEntry>> {
        self.repository.get(order_id).await?;
        let entries = self.repository.history(log, order_id).await?;
        Ok(project(log, entries))
    }
}
