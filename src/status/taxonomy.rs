//! Status enumerations and their transition tables
//!
//! Order and fulfillment statuses are independent state machines. Each has a
//! `const` table of [`TransitionRule`]s naming the roles that may perform
//! every legal step. A pair missing from the table is forbidden to everyone.

use crate::core::auth::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A status string that is not a member of the enumeration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status value '{0}'")]
pub struct UnknownStatus(pub String);

/// Which status column of an order a change applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusDimension {
    Order,
    Fulfillment,
    Payment,
}

impl StatusDimension {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusDimension::Order => "order",
            StatusDimension::Fulfillment => "fulfillment",
            StatusDimension::Payment => "payment",
        }
    }
}

impl fmt::Display for StatusDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One legal step of a state machine and who may take it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule<S: 'static> {
    pub from: S,
    pub to: S,
    pub roles: &'static [Role],
}

/// A status enumeration driven by a static transition table
pub trait StatusMachine:
    Copy + Eq + fmt::Debug + fmt::Display + FromStr<Err = UnknownStatus> + Send + Sync + 'static
{
    const DIMENSION: StatusDimension;

    /// Every member, in lifecycle order
    const ALL: &'static [Self];

    fn rules() -> &'static [TransitionRule<Self>];

    fn as_str(self) -> &'static str;

    /// Fixed human-readable description used in audit notes and timelines
    fn description(self) -> &'static str;

    /// Legal next states, in table order
    fn next_states(self) -> Vec<Self> {
        Self::rules()
            .iter()
            .filter(|rule| rule.from == self)
            .map(|rule| rule.to)
            .collect()
    }

    fn rule(self, to: Self) -> Option<&'static TransitionRule<Self>> {
        Self::rules()
            .iter()
            .find(|rule| rule.from == self && rule.to == to)
    }

    fn is_terminal(self) -> bool {
        !Self::rules().iter().any(|rule| rule.from == self)
    }
}

const ANY_ROLE: &[Role] = &[Role::Customer, Role::Staff, Role::Admin];
const OPERATORS: &[Role] = &[Role::Staff, Role::Admin];

macro_rules! status_strings {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(UnknownStatus(other.to_string())),
                }
            }
        }
    };
}

/// Customer-facing lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

status_strings!(OrderStatus {
    New => "new",
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Returned => "returned",
});

#[rustfmt::skip]
const ORDER_RULES: &[TransitionRule<OrderStatus>] = &[
    TransitionRule { from: OrderStatus::New, to: OrderStatus::Pending, roles: ANY_ROLE },
    TransitionRule { from: OrderStatus::New, to: OrderStatus::Cancelled, roles: ANY_ROLE },
    TransitionRule { from: OrderStatus::Pending, to: OrderStatus::Processing, roles: OPERATORS },
    TransitionRule { from: OrderStatus::Pending, to: OrderStatus::Cancelled, roles: ANY_ROLE },
    TransitionRule { from: OrderStatus::Processing, to: OrderStatus::Shipped, roles: OPERATORS },
    TransitionRule { from: OrderStatus::Processing, to: OrderStatus::Cancelled, roles: OPERATORS },
    TransitionRule { from: OrderStatus::Shipped, to: OrderStatus::Delivered, roles: OPERATORS },
    TransitionRule { from: OrderStatus::Shipped, to: OrderStatus::Returned, roles: OPERATORS },
    TransitionRule { from: OrderStatus::Delivered, to: OrderStatus::Returned, roles: ANY_ROLE },
];

impl StatusMachine for OrderStatus {
    const DIMENSION: StatusDimension = StatusDimension::Order;

    const ALL: &'static [Self] = &[
        OrderStatus::New,
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    fn rules() -> &'static [TransitionRule<Self>] {
        ORDER_RULES
    }

    fn as_str(self) -> &'static str {
        OrderStatus::as_str(self)
    }

    fn description(self) -> &'static str {
        match self {
            OrderStatus::New => "Order has been created but not yet confirmed.",
            OrderStatus::Pending => "Order has been confirmed and is awaiting processing.",
            OrderStatus::Processing => "Order is being prepared for shipping.",
            OrderStatus::Shipped => "Order has been shipped and is in transit.",
            OrderStatus::Delivered => "Order has been delivered to the customer.",
            OrderStatus::Cancelled => "Order has been cancelled.",
            OrderStatus::Returned => "Order has been returned by the customer.",
        }
    }
}

/// Warehouse and producer-facing lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Pending,
    Processing,
    Picked,
    Packed,
    Ready,
    Shipped,
    Completed,
    Cancelled,
}

status_strings!(FulfillmentStatus {
    Pending => "pending",
    Processing => "processing",
    Picked => "picked",
    Packed => "packed",
    Ready => "ready",
    Shipped => "shipped",
    Completed => "completed",
    Cancelled => "cancelled",
});

#[rustfmt::skip]
const FULFILLMENT_RULES: &[TransitionRule<FulfillmentStatus>] = &[
    TransitionRule { from: FulfillmentStatus::Pending, to: FulfillmentStatus::Processing, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Pending, to: FulfillmentStatus::Cancelled, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Processing, to: FulfillmentStatus::Picked, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Processing, to: FulfillmentStatus::Cancelled, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Picked, to: FulfillmentStatus::Packed, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Picked, to: FulfillmentStatus::Cancelled, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Packed, to: FulfillmentStatus::Ready, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Packed, to: FulfillmentStatus::Cancelled, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Ready, to: FulfillmentStatus::Shipped, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Ready, to: FulfillmentStatus::Cancelled, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Shipped, to: FulfillmentStatus::Completed, roles: OPERATORS },
    TransitionRule { from: FulfillmentStatus::Shipped, to: FulfillmentStatus::Cancelled, roles: OPERATORS },
];

impl StatusMachine for FulfillmentStatus {
    const DIMENSION: StatusDimension = StatusDimension::Fulfillment;

    const ALL: &'static [Self] = &[
        FulfillmentStatus::Pending,
        FulfillmentStatus::Processing,
        FulfillmentStatus::Picked,
        FulfillmentStatus::Packed,
        FulfillmentStatus::Ready,
        FulfillmentStatus::Shipped,
        FulfillmentStatus::Completed,
        FulfillmentStatus::Cancelled,
    ];

    fn rules() -> &'static [TransitionRule<Self>] {
        FULFILLMENT_RULES
    }

    fn as_str(self) -> &'static str {
        FulfillmentStatus::as_str(self)
    }

    fn description(self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "Order is waiting to enter fulfillment.",
            FulfillmentStatus::Processing => "Order has been accepted for fulfillment.",
            FulfillmentStatus::Picked => "Items have been picked from inventory.",
            FulfillmentStatus::Packed => "Items have been packed for shipment.",
            FulfillmentStatus::Ready => "Package is ready for pickup or dispatch.",
            FulfillmentStatus::Shipped => "Package has been handed to the carrier.",
            FulfillmentStatus::Completed => "Fulfillment has been completed.",
            FulfillmentStatus::Cancelled => "Fulfillment has been cancelled.",
        }
    }
}

/// Payment state as seen by the order core
///
/// Payment moves `pending → paid → refunded`, with `failed` on the side.
/// The core only ever changes it as a side effect of cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

status_strings!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Refunded => "refunded",
    Failed => "failed",
});

impl PaymentStatus {
    pub const ALL: &'static [PaymentStatus] = &[
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Refunded,
        PaymentStatus::Failed,
    ];

    pub fn description(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Payment has not been received yet.",
            PaymentStatus::Paid => "Payment has been received.",
            PaymentStatus::Refunded => "Payment has been refunded to the customer.",
            PaymentStatus::Failed => "Payment attempt failed.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip_for_every_member() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        for status in FulfillmentStatus::ALL {
            assert_eq!(status.as_str().parse::<FulfillmentStatus>().unwrap(), *status);
        }
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "teleported".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("teleported".to_string()));
        assert!("Processing".parse::<FulfillmentStatus>().is_err());
    }

    #[test]
    fn test_order_terminal_states() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Returned.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
        assert_eq!(OrderStatus::Delivered.next_states(), vec![OrderStatus::Returned]);
    }

    #[test]
    fn test_fulfillment_cancel_reachable_from_every_non_terminal() {
        for status in FulfillmentStatus::ALL {
            if status.is_terminal() {
                continue;
            }
            assert!(
                status.next_states().contains(&FulfillmentStatus::Cancelled),
                "{} should be cancellable",
                status
            );
        }
        assert!(FulfillmentStatus::Completed.is_terminal());
        assert!(FulfillmentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_every_status_has_a_description() {
        for status in OrderStatus::ALL {
            assert!(!status.description().is_empty());
        }
        for status in FulfillmentStatus::ALL {
            assert!(!status.description().is_empty());
        }
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&FulfillmentStatus::Picked).unwrap();
        assert_eq!(json, "\"picked\"");
        let parsed: PaymentStatus = serde_json::from_str("\"refunded\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Refunded);
    }
}
