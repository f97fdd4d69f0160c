//! Fulfillment prerequisites, the transition orchestrator, timelines and
//! warehouse documents

pub mod documents;
pub mod service;
pub mod timeline;
pub mod validation;

pub use documents::{FulfillmentDocuments, PackingSlip, PackingSlipItem, PickList, PickListItem};
pub use service::{FulfillmentOutcome, StatusService, TransitionOptions};
pub use timeline::{TimelineEntry, TimelineProjector};
pub use validation::{
    CheckResult, PrerequisiteValidator, ValidationOverride, ValidationReport, override_validation,
};
