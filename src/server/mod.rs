//! HTTP surface
//!
//! `ServerBuilder` wires the store, auth provider, event bus and notifier
//! into the services and exposes them through an axum `Router`.

pub mod builder;
pub mod extractors;
pub mod handlers;
pub mod router;
pub mod state;

pub use builder::ServerBuilder;
pub use extractors::CurrentActor;
pub use router::build_routes;
pub use state::AppState;
