//! Core types shared by every layer: actors, errors, events and storage

pub mod auth;
pub mod error;
pub mod events;
pub mod store;

pub use auth::{Actor, AuthProvider, Role, StaticTokenAuthProvider, TrustedHeaderAuthProvider};
pub use error::{ErrorResponse, OrderflowError, OrderflowResult};
pub use events::{EventBus, EventEnvelope, OrderEvent};
pub use store::{FetchOptions, Filter, Record, SortDirection, Store};
