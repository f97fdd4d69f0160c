//! Axum extractors for the calling actor

use super::state::AppState;
use crate::core::auth::Actor;
use crate::core::error::OrderflowError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::ops::Deref;

/// The authenticated caller
///
/// Resolved through the configured [`AuthProvider`](crate::core::auth::AuthProvider).
/// Missing or unknown credentials reject the request with 401.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl Deref for CurrentActor {
    type Target = Actor;

    fn deref(&self) -> &Actor {
        &self.0
    }
}

impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = OrderflowError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.auth.authenticate(&parts.headers).await {
            Ok(actor) => Ok(CurrentActor(actor)),
            Err(e) => {
                tracing::debug!(path = %parts.uri.path(), error = %e, "Authentication failed");
                Err(OrderflowError::Unauthorized(e.to_string()))
            }
        }
    }
}
