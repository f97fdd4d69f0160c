//! # orderflow
//!
//! Order and fulfillment status tracking for a marketplace.
//!
//! - **Two status machines**: the customer-facing order status and the
//!   warehouse fulfillment status, each a `const` transition table with
//!   per-transition role sets
//! - **Prerequisite gate**: entering fulfillment runs every check and
//!   returns the full report; admins may override or skip it
//! - **Reconciliation**: a change on one dimension pulls the other along
//!   through an explicit table
//! - **Audit trail**: every change lands in a history log, projected as a
//!   timeline
//! - **Post-commit notifications**: events are published on a broadcast
//!   bus and delivered on a separate task
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orderflow::prelude::*;
//!
//! ServerBuilder::new()
//!     .with_config(ServiceConfig::load(None)?)
//!     .with_store(InMemoryStore::new())
//!     .serve("0.0.0.0:3000")
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod fulfillment;
pub mod logging;
pub mod notify;
pub mod orders;
pub mod server;
pub mod status;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    pub use crate::config::ServiceConfig;
    pub use crate::core::{
        Actor, AuthProvider, EventBus, EventEnvelope, OrderEvent, OrderflowError,
        OrderflowResult, Role, StaticTokenAuthProvider, Store, TrustedHeaderAuthProvider,
    };
    pub use crate::fulfillment::{
        FulfillmentDocuments, FulfillmentOutcome, PackingSlip, PickList, PrerequisiteValidator,
        StatusService, TimelineEntry, TimelineProjector, ValidationReport,
    };
    pub use crate::notify::{LogNotifier, NotificationDispatcher, Notifier};
    pub use crate::orders::{NewOrder, NewOrderItem, Order, OrderRepository, OrderService};
    pub use crate::server::ServerBuilder;
    pub use crate::status::{
        FulfillmentStatus, OrderStatus, PaymentStatus, StatusMachine, TransitionDecision,
    };

    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryStore;
}
