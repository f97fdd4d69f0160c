//! Typed error handling for orderflow
//!
//! Every failure path that matters to a caller is a distinct variant, so
//! handlers and clients can match on the category instead of sniffing
//! messages.
//!
//! # Error Categories
//!
//! - `NotFound`: the referenced order does not exist (404)
//! - `Forbidden`: the actor's role may not perform the operation (403)
//! - `BadRequest`: illegal transition or malformed input (400)
//! - `ValidationFailed`: fulfillment prerequisites failed, carries the report (400)
//! - `Unauthorized`: no usable credentials (401)
//! - `Conflict`: the order changed underneath a read-validate-write (409)
//! - `Infrastructure`: the store or another collaborator is unreachable (500)
//!
//! # Example
//!
//! ```rust,ignore
//! match service.transition_order_status(id, "processing", &actor, None).await {
//!     Ok(order) => println!("now {}", order.status),
//!     Err(OrderflowError::Forbidden(reason)) => println!("denied: {}", reason),
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use crate::fulfillment::validation::ValidationReport;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for orderflow
#[derive(Debug, Error)]
pub enum OrderflowError {
    /// Referenced entity does not exist
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// Actor is authenticated but not allowed to do this
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Structurally invalid request
    #[error("{0}")]
    BadRequest(String),

    /// Fulfillment prerequisites were not met and not overridden
    #[error("Fulfillment prerequisites not met for order '{}'", .0.order_id)]
    ValidationFailed(Box<ValidationReport>),

    /// Missing or unknown credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Concurrent modification detected by the version guard
    #[error("Order '{id}' was modified concurrently, reload and retry")]
    Conflict { id: Uuid },

    /// Persistence or another collaborator failed
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl OrderflowError {
    pub fn not_found(id: Uuid) -> Self {
        OrderflowError::NotFound { entity: "Order", id }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrderflowError::NotFound { .. } => StatusCode::NOT_FOUND,
            OrderflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            OrderflowError::BadRequest(_) => StatusCode::BAD_REQUEST,
            OrderflowError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            OrderflowError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            OrderflowError::Conflict { .. } => StatusCode::CONFLICT,
            OrderflowError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            OrderflowError::NotFound { .. } => "NOT_FOUND",
            OrderflowError::Forbidden(_) => "FORBIDDEN",
            OrderflowError::BadRequest(_) => "BAD_REQUEST",
            OrderflowError::ValidationFailed(_) => "VALIDATION_FAILED",
            OrderflowError::Unauthorized(_) => "UNAUTHORIZED",
            OrderflowError::Conflict { .. } => "CONFLICT",
            OrderflowError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is a server-side failure
    pub fn is_internal(&self) -> bool {
        matches!(self, OrderflowError::Infrastructure(_))
    }

    /// Convert to an error response
    ///
    /// Internal failures get a generic message; the detail only goes to logs.
    pub fn to_response(&self) -> ErrorResponse {
        let message = if self.is_internal() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        ErrorResponse {
            code: self.error_code().to_string(),
            message,
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            OrderflowError::NotFound { entity, id } => Some(serde_json::json!({
                "entity": entity,
                "id": id.to_string()
            })),
            OrderflowError::ValidationFailed(report) => Some(serde_json::json!({
                "status": "validation_failed",
                "report": report
            })),
            OrderflowError::Conflict { id } => Some(serde_json::json!({
                "id": id.to_string()
            })),
            _ => None,
        }
    }
}

impl IntoResponse for OrderflowError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        }

        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

/// Store and notifier collaborators report failures through anyhow
impl From<anyhow::Error> for OrderflowError {
    fn from(err: anyhow::Error) -> Self {
        OrderflowError::Infrastructure(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for OrderflowError {
    fn from(err: serde_json::Error) -> Self {
        OrderflowError::Infrastructure(format!("Malformed record: {}", err))
    }
}

impl From<validator::ValidationErrors> for OrderflowError {
    fn from(err: validator::ValidationErrors) -> Self {
        OrderflowError::BadRequest(format!("Invalid request: {}", err))
    }
}

/// A specialized Result type for orderflow operations
pub type OrderflowResult<T> = Result<T, OrderflowError>;
