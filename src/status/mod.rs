//! Status taxonomy, transition decisions and cross-dimension reconciliation

pub mod reconcile;
pub mod taxonomy;
pub mod transitions;

pub use reconcile::{StatusSnapshot, fulfillment_cancel_allowed};
pub use taxonomy::{
    FulfillmentStatus, OrderStatus, PaymentStatus, StatusDimension, StatusMachine,
    TransitionRule, UnknownStatus,
};
pub use transitions::{
    TransitionDecision, allowed_transitions, can_transition, check_transition, valid_transitions,
};
