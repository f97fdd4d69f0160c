//! Reconciliation between the status dimensions
//!
//! Order and fulfillment statuses move independently. This table couples
//! them where a terminal or shipping step in one must be reflected in the
//! other, and applies the refund rule to any resulting cancellation.
//!
//! | Trigger                     | Effect                                         |
//! |-----------------------------|------------------------------------------------|
//! | fulfillment → `shipped`     | order → `shipped` unless settled               |
//! | fulfillment → `completed`   | order → `delivered` unless terminal            |
//! | fulfillment → `cancelled`   | order → `cancelled` where the order table allows |
//! | order → `cancelled`         | fulfillment → `cancelled` unless terminal      |
//! | order ends up `cancelled`   | payment `paid` → `refunded`                    |
//!
//! An order is settled once it is terminal or delivered. Settled orders are
//! never moved backwards by fulfillment. A shipped order has no edge into
//! `cancelled`, so its fulfillment cannot be cancelled either; it has to be
//! returned.

use super::taxonomy::{FulfillmentStatus, OrderStatus, PaymentStatus, StatusMachine};
use serde::Serialize;

/// The three status columns of an order at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: OrderStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub payment_status: PaymentStatus,
}

fn is_settled(order: OrderStatus) -> bool {
    order.is_terminal() || order == OrderStatus::Delivered
}

/// Order status that a fulfillment step drags the order into, if any
pub fn order_follows_fulfillment(
    fulfillment: FulfillmentStatus,
    order: OrderStatus,
) -> Option<OrderStatus> {
    let target = match fulfillment {
        FulfillmentStatus::Shipped if !is_settled(order) => OrderStatus::Shipped,
        FulfillmentStatus::Completed if !order.is_terminal() => OrderStatus::Delivered,
        FulfillmentStatus::Cancelled if order.next_states().contains(&OrderStatus::Cancelled) => {
            OrderStatus::Cancelled
        }
        _ => return None,
    };

    (target != order).then_some(target)
}

/// Whether fulfillment may be cancelled while the order is in `order`
///
/// The cancellation must either leave a settled order alone or be one the
/// order table itself permits.
pub fn fulfillment_cancel_allowed(order: OrderStatus) -> bool {
    is_settled(order) || order.next_states().contains(&OrderStatus::Cancelled)
}

/// Fulfillment status that an order step drags fulfillment into, if any
pub fn fulfillment_follows_order(
    order: OrderStatus,
    fulfillment: FulfillmentStatus,
) -> Option<FulfillmentStatus> {
    (order == OrderStatus::Cancelled && !fulfillment.is_terminal())
        .then_some(FulfillmentStatus::Cancelled)
}

/// Payment status after the order lands in `order`
pub fn refund_on_cancel(order: OrderStatus, payment: PaymentStatus) -> Option<PaymentStatus> {
    (order == OrderStatus::Cancelled && payment == PaymentStatus::Paid)
        .then_some(PaymentStatus::Refunded)
}

impl StatusSnapshot {
    /// Apply an order status change and everything it implies
    pub fn with_order_status(self, status: OrderStatus) -> Self {
        let fulfillment_status = fulfillment_follows_order(status, self.fulfillment_status)
            .unwrap_or(self.fulfillment_status);
        let payment_status = refund_on_cancel(status, self.payment_status).unwrap_or(self.payment_status);

        Self {
            status,
            fulfillment_status,
            payment_status,
        }
    }

    /// Apply a fulfillment status change and everything it implies
    pub fn with_fulfillment_status(self, fulfillment_status: FulfillmentStatus) -> Self {
        let status = order_follows_fulfillment(fulfillment_status, self.status).unwrap_or(self.status);
        let payment_status = refund_on_cancel(status, self.payment_status).unwrap_or(self.payment_status);

        Self {
            status,
            fulfillment_status,
            payment_status,
        }
    }
}
