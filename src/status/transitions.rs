//! Pure transition decisions
//!
//! Nothing here touches storage. The orchestrator asks for a decision
//! before any mutation and maps rejections onto typed errors.

use super::taxonomy::StatusMachine;
use crate::core::auth::Role;
use crate::core::error::{OrderflowError, OrderflowResult};

/// Outcome of checking a requested status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionDecision {
    Allowed,
    /// One of the statuses is not a member of the enumeration
    InvalidStatus,
    /// The pair is not in the adjacency table
    NotAdjacent {
        current: String,
        requested: String,
        valid: Vec<String>,
    },
    /// The pair is legal but not for this role
    NotAuthorized {
        role: Role,
        current: String,
        requested: String,
    },
}

impl TransitionDecision {
    pub fn allowed(&self) -> bool {
        matches!(self, TransitionDecision::Allowed)
    }

    /// Human-readable rejection reason, `None` when allowed
    pub fn reason(&self) -> Option<String> {
        match self {
            TransitionDecision::Allowed => None,
            TransitionDecision::InvalidStatus => Some("Invalid status value".to_string()),
            TransitionDecision::NotAdjacent {
                current,
                requested,
                valid,
            } => {
                let valid = if valid.is_empty() {
                    "none".to_string()
                } else {
                    valid.join(", ")
                };
                Some(format!(
                    "Cannot transition from '{}' to '{}'. Valid transitions: {}",
                    current, requested, valid
                ))
            }
            TransitionDecision::NotAuthorized {
                role,
                current,
                requested,
            } => Some(format!(
                "User with role '{}' cannot transition from '{}' to '{}'",
                role, current, requested
            )),
        }
    }

    /// Map a rejection onto the error a caller should see
    ///
    /// Structural problems are `BadRequest`; role problems are `Forbidden`.
    pub fn into_result(self) -> OrderflowResult<()> {
        let reason = self.reason();
        match (self, reason) {
            (TransitionDecision::Allowed, _) | (_, None) => Ok(()),
            (TransitionDecision::NotAuthorized { .. }, Some(reason)) => {
                Err(OrderflowError::Forbidden(reason))
            }
            (_, Some(reason)) => Err(OrderflowError::BadRequest(reason)),
        }
    }
}

/// Decide a change between two known statuses
pub fn check_transition<S: StatusMachine>(current: S, requested: S, role: Role) -> TransitionDecision {
    match current.rule(requested) {
        None => TransitionDecision::NotAdjacent {
            current: current.as_str().to_string(),
            requested: requested.as_str().to_string(),
            valid: current
                .next_states()
                .into_iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        },
        Some(rule) if !rule.roles.contains(&role) => TransitionDecision::NotAuthorized {
            role,
            current: current.as_str().to_string(),
            requested: requested.as_str().to_string(),
        },
        Some(_) => TransitionDecision::Allowed,
    }
}

/// Decide a change given raw status strings
///
/// Unknown values fail closed.
pub fn can_transition<S: StatusMachine>(current: &str, requested: &str, role: Role) -> TransitionDecision {
    match (current.parse::<S>(), requested.parse::<S>()) {
        (Ok(current), Ok(requested)) => check_transition(current, requested, role),
        _ => TransitionDecision::InvalidStatus,
    }
}

/// Legal next states for a raw status string; empty when unknown or terminal
pub fn valid_transitions<S: StatusMachine>(current: &str) -> Vec<&'static str> {
    current
        .parse::<S>()
        .map(|status| status.next_states().into_iter().map(S::as_str).collect())
        .unwrap_or_default()
}

/// The subset of next states this role may actually request
pub fn allowed_transitions<S: StatusMachine>(current: S, role: Role) -> Vec<S> {
    S::rules()
        .iter()
        .filter(|rule| rule.from == current && rule.roles.contains(&role))
        .map(|rule| rule.to)
        .collect()
}
