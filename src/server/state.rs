//! Shared handler state

use crate::core::auth::AuthProvider;
use crate::fulfillment::{FulfillmentDocuments, StatusService, TimelineProjector};
use crate::orders::OrderService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub status: StatusService,
    pub orders: OrderService,
    pub timeline: TimelineProjector,
    pub documents: FulfillmentDocuments,
    pub auth: Arc<dyn AuthProvider>,
}
