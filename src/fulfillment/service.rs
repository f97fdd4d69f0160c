//! Status transition orchestration
//!
//! A transition is: load, decide, (gate on prerequisites), reconcile,
//! guarded write, history, events. The write is the commit point. History
//! and notifications after it are best-effort and never undo the change.

use super::validation::{
    PrerequisiteValidator, ValidationOverride, ValidationReport, override_validation,
};
use crate::core::auth::{Actor, Role};
use crate::core::error::{OrderflowError, OrderflowResult};
use crate::core::events::{EventBus, OrderEvent};
use crate::orders::model::VALIDATION_OVERRIDE_KEY;
use crate::orders::{HistoryLog, Order, OrderRepository};
use crate::status::{
    FulfillmentStatus, OrderStatus, StatusDimension, StatusMachine, StatusSnapshot,
    TransitionDecision, allowed_transitions, can_transition, fulfillment_cancel_allowed,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Result of a fulfillment status request
///
/// A failed prerequisite check is not an error: nothing was mutated and
/// the caller gets the full report to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum FulfillmentOutcome {
    Updated(Order),
    ValidationFailed(ValidationReport),
}

/// What an actor may do next with one status dimension of an order
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOptions {
    pub order_id: Uuid,
    pub current_status: &'static str,
    pub description: &'static str,
    pub valid_transitions: Vec<&'static str>,
    pub allowed_transitions: Vec<&'static str>,
}

impl TransitionOptions {
    fn for_status<S: StatusMachine>(order_id: Uuid, current: S, role: Role) -> Self {
        Self {
            order_id,
            current_status: current.as_str(),
            description: current.description(),
            valid_transitions: current.next_states().into_iter().map(S::as_str).collect(),
            allowed_transitions: allowed_transitions(current, role)
                .into_iter()
                .map(S::as_str)
                .collect(),
        }
    }
}

/// Audit note for a change when the caller gave none
pub fn compose_note(from: &str, from_description: &str, to: &str, to_description: &str) -> String {
    format!(
        "Status changed from '{}' ({}) to '{}' ({})",
        from, from_description, to, to_description
    )
}

fn compose_status_note<S: StatusMachine>(from: S, to: S) -> String {
    compose_note(from.as_str(), from.description(), to.as_str(), to.description())
}

/// Check a requested change against the transition tables
fn decide<S: StatusMachine>(current: S, requested: &str, role: Role) -> OrderflowResult<S> {
    can_transition::<S>(current.as_str(), requested, role).into_result()?;
    requested.parse::<S>().map_err(|_| {
        OrderflowError::BadRequest(
            TransitionDecision::InvalidStatus
                .reason()
                .unwrap_or_default(),
        )
    })
}

fn non_blank(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Failing checks that the order's recorded override does not cover
///
/// An override only vouches for the checks that were failing when it was
/// recorded. Without a readable override every failure is uncovered.
fn uncovered_failures(order: &Order, report: &ValidationReport) -> Vec<String> {
    let covered = order
        .validation_override()
        .and_then(|value| serde_json::from_value::<ValidationOverride>(value.clone()).ok())
        .map(|info| info.failed_checks)
        .unwrap_or_default();

    report
        .failed_checks()
        .into_iter()
        .filter(|name| !covered.contains(name))
        .collect()
}

fn fulfillment_reference(order_id: Uuid) -> String {
    let simple = order_id.simple().to_string();
    format!("FUL-{}", simple[..8].to_ascii_uppercase())
}

/// A status change about to be committed
struct PendingChange<'a> {
    order: Order,
    after: StatusSnapshot,
    actor: &'a Actor,
    notes: Option<String>,
    primary: StatusDimension,
    clear_override: bool,
}

#[derive(Clone)]
pub struct StatusService {
    repository: OrderRepository,
    validator: PrerequisiteValidator,
    events: EventBus,
}

impl StatusService {
    pub fn new(repository: OrderRepository, validator: PrerequisiteValidator, events: EventBus) -> Self {
        Self {
            repository,
            validator,
            events,
        }
    }

    pub fn repository(&self) -> &OrderRepository {
        &self.repository
    }

    /// Move the customer-facing order status
    ///
    /// A customer can only move their own orders; anyone else's is `NotFound`.
    pub async fn transition_order_status(
        &self,
        order_id: Uuid,
        new_status: &str,
        actor: &Actor,
        notes: Option<String>,
    ) -> OrderflowResult<Order> {
        let order = self.readable_order(order_id, actor).await?;
        let requested = decide(order.status, new_status, actor.role)?;
        let after = order.snapshot().with_order_status(requested);

        self.commit(PendingChange {
            order,
            after,
            actor,
            notes,
            primary: StatusDimension::Order,
            clear_override: false,
        })
        .await
    }

    /// Cancel an order, with an optional reason recorded as the note
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> OrderflowResult<Order> {
        self.transition_order_status(order_id, OrderStatus::Cancelled.as_str(), actor, reason)
            .await
    }

    /// Move the fulfillment status, gating entry into `processing`
    ///
    /// Entering `processing` runs the prerequisite checks unless an admin
    /// sets `skip_validation`. A failing report is still accepted when the
    /// override recorded on the order covers every failing check; the
    /// override is consumed. Fulfillment of a shipped order cannot be
    /// cancelled, since the order itself has no way into `cancelled`.
    pub async fn update_fulfillment_status(
        &self,
        order_id: Uuid,
        new_status: &str,
        actor: &Actor,
        notes: Option<String>,
        skip_validation: bool,
    ) -> OrderflowResult<FulfillmentOutcome> {
        let order = self.readable_order(order_id, actor).await?;
        let requested = decide(order.fulfillment_status, new_status, actor.role)?;

        if requested == FulfillmentStatus::Cancelled && !fulfillment_cancel_allowed(order.status) {
            return Err(OrderflowError::BadRequest(format!(
                "Fulfillment cannot be cancelled while the order is '{}'",
                order.status
            )));
        }

        if skip_validation && !actor.is_admin() {
            return Err(OrderflowError::Forbidden(
                "Only administrators can skip fulfillment validation".to_string(),
            ));
        }

        let mut clear_override = false;
        if requested == FulfillmentStatus::Processing {
            clear_override = order.validation_override().is_some();

            if skip_validation {
                tracing::warn!(
                    order_id = %order.id,
                    actor_id = %actor.id,
                    "Fulfillment validation skipped by administrator"
                );
            } else {
                let report = self.validator.validate_order(&order).await?;
                if !report.is_valid {
                    let uncovered = uncovered_failures(&order, &report);
                    if !uncovered.is_empty() {
                        tracing::info!(
                            order_id = %order.id,
                            failed = ?report.failed_checks(),
                            uncovered = ?uncovered,
                            "Fulfillment blocked by failing prerequisites"
                        );
                        return Ok(FulfillmentOutcome::ValidationFailed(report));
                    }
                    tracing::warn!(
                        order_id = %order.id,
                        failed = ?report.failed_checks(),
                        "Failing prerequisites accepted on recorded override"
                    );
                }
            }
        }

        let after = order.snapshot().with_fulfillment_status(requested);
        let updated = self
            .commit(PendingChange {
                order,
                after,
                actor,
                notes,
                primary: StatusDimension::Fulfillment,
                clear_override,
            })
            .await?;

        Ok(FulfillmentOutcome::Updated(updated))
    }

    /// Prerequisite report for an order, without touching it
    pub async fn validate_fulfillment_prerequisites(
        &self,
        order_id: Uuid,
    ) -> OrderflowResult<ValidationReport> {
        self.validator.validate(order_id).await
    }

    /// Record an administrative override of the prerequisite checks
    ///
    /// The override is stored in the order metadata, where the next entry
    /// into `processing` picks it up, and an internal note is appended.
    pub async fn override_fulfillment_validation(
        &self,
        order_id: Uuid,
        actor: &Actor,
        reason: &str,
    ) -> OrderflowResult<ValidationReport> {
        let order = self.repository.get(order_id).await?;
        let report = self.validator.validate_order(&order).await?;
        let report = override_validation(report, actor, reason)?;

        let Some(info) = &report.override_info else {
            return Err(OrderflowError::Infrastructure(
                "Override was not recorded on the report".to_string(),
            ));
        };

        let mut metadata = order.metadata.clone();
        metadata.insert(VALIDATION_OVERRIDE_KEY.to_string(), serde_json::to_value(info)?);
        let mut patch = Map::new();
        patch.insert("metadata".to_string(), Value::Object(metadata));
        self.repository
            .update_guarded(order.id, order.version, patch)
            .await?;

        tracing::warn!(
            order_id = %order.id,
            actor_id = %actor.id,
            reason = %info.reason,
            failed_checks = ?info.failed_checks,
            "Fulfillment validation overridden"
        );

        let failed = if info.failed_checks.is_empty() {
            "none".to_string()
        } else {
            info.failed_checks.join(", ")
        };
        let note = format!(
            "Fulfillment validation overridden by {}: {}. Failed checks: {}",
            actor.email, info.reason, failed
        );
        if let Err(e) = self.repository.add_note(order.id, actor.id, note, true).await {
            tracing::error!(order_id = %order.id, error = %e, "Failed to record override note");
        }

        Ok(report)
    }

    pub async fn order_transitions(&self, order_id: Uuid, actor: &Actor) -> OrderflowResult<TransitionOptions> {
        let order = self.readable_order(order_id, actor).await?;
        Ok(TransitionOptions::for_status(order.id, order.status, actor.role))
    }

    pub async fn fulfillment_transitions(
        &self,
        order_id: Uuid,
        actor: &Actor,
    ) -> OrderflowResult<TransitionOptions> {
        let order = self.readable_order(order_id, actor).await?;
        Ok(TransitionOptions::for_status(
            order.id,
            order.fulfillment_status,
            actor.role,
        ))
    }

    /// Load an order the actor is allowed to see
    ///
    /// A customer asking about someone else's order gets `NotFound`.
    pub async fn readable_order(&self, order_id: Uuid, actor: &Actor) -> OrderflowResult<Order> {
        let order = self.repository.get(order_id).await?;
        if !actor.can_access(order.customer_id) {
            return Err(OrderflowError::not_found(order_id));
        }
        Ok(order)
    }

    async fn commit(&self, change: PendingChange<'_>) -> OrderflowResult<Order> {
        let PendingChange {
            order,
            after,
            actor,
            notes,
            primary,
            clear_override,
        } = change;
        let before = order.snapshot();

        let composed = match primary {
            StatusDimension::Fulfillment => {
                compose_status_note(before.fulfillment_status, after.fulfillment_status)
            }
            _ => compose_status_note(before.status, after.status),
        };
        let status_note = non_blank(notes).unwrap_or(composed);

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(after.status));
        patch.insert("fulfillment_status".to_string(), json!(after.fulfillment_status));
        patch.insert("payment_status".to_string(), json!(after.payment_status));
        patch.insert("status_note".to_string(), json!(status_note));
        if clear_override {
            let mut metadata = order.metadata.clone();
            metadata.remove(VALIDATION_OVERRIDE_KEY);
            patch.insert("metadata".to_string(), Value::Object(metadata));
        }

        let updated = self
            .repository
            .update_guarded(order.id, order.version, patch)
            .await?;

        tracing::info!(
            order_id = %updated.id,
            actor_id = %actor.id,
            dimension = %primary,
            status = %updated.status,
            fulfillment_status = %updated.fulfillment_status,
            payment_status = %updated.payment_status,
            "Order status updated"
        );

        let mut events = Vec::new();

        if before.status != after.status {
            let note = if primary == StatusDimension::Order {
                status_note.clone()
            } else {
                format!(
                    "{}. Follows {} status '{}'",
                    compose_status_note(before.status, after.status),
                    primary,
                    after.fulfillment_status
                )
            };
            self.record_history(
                HistoryLog::Order,
                &updated,
                before.status.as_str(),
                after.status.as_str(),
                actor,
                &note,
            )
            .await;
            events.push(OrderEvent::StatusChanged {
                order_id: updated.id,
                dimension: StatusDimension::Order,
                previous: before.status.as_str().to_string(),
                new: after.status.as_str().to_string(),
                actor_id: actor.id,
                recipient_id: Some(updated.customer_id),
                message: note,
            });
        }

        if before.fulfillment_status != after.fulfillment_status {
            let note = if primary == StatusDimension::Fulfillment {
                status_note.clone()
            } else {
                format!(
                    "{}. Follows {} status '{}'",
                    compose_status_note(before.fulfillment_status, after.fulfillment_status),
                    primary,
                    after.status
                )
            };
            self.record_history(
                HistoryLog::Fulfillment,
                &updated,
                before.fulfillment_status.as_str(),
                after.fulfillment_status.as_str(),
                actor,
                &note,
            )
            .await;
            events.push(OrderEvent::StatusChanged {
                order_id: updated.id,
                dimension: StatusDimension::Fulfillment,
                previous: before.fulfillment_status.as_str().to_string(),
                new: after.fulfillment_status.as_str().to_string(),
                actor_id: actor.id,
                recipient_id: updated.producer_id,
                message: note,
            });
        }

        if before.payment_status != after.payment_status {
            let message = compose_note(
                before.payment_status.as_str(),
                before.payment_status.description(),
                after.payment_status.as_str(),
                after.payment_status.description(),
            );
            tracing::info!(
                order_id = %updated.id,
                from = %before.payment_status,
                to = %after.payment_status,
                "Payment status changed by cancellation"
            );
            events.push(OrderEvent::StatusChanged {
                order_id: updated.id,
                dimension: StatusDimension::Payment,
                previous: before.payment_status.as_str().to_string(),
                new: after.payment_status.as_str().to_string(),
                actor_id: actor.id,
                recipient_id: Some(updated.customer_id),
                message,
            });
        }

        if after.fulfillment_status == FulfillmentStatus::Processing
            && before.fulfillment_status != FulfillmentStatus::Processing
        {
            events.push(OrderEvent::FulfillmentRequested {
                order_id: updated.id,
                recipient_id: updated.producer_id,
                reference_id: fulfillment_reference(updated.id),
            });
        }

        if after.status == OrderStatus::Delivered && before.status != OrderStatus::Delivered {
            events.push(OrderEvent::OrderCompleted {
                order_id: updated.id,
                recipient_id: Some(updated.customer_id),
            });
        }

        for event in events {
            self.events.publish(event);
        }

        Ok(updated)
    }

    /// Append one audit entry; a failure is logged, the change stands
    async fn record_history(
        &self,
        log: HistoryLog,
        order: &Order,
        previous: &str,
        new: &str,
        actor: &Actor,
        note: &str,
    ) {
        if let Err(e) = self
            .repository
            .append_history(
                log,
                order.id,
                Some(previous),
                new,
                Some(actor.id),
                Some(note.to_string()),
            )
            .await
        {
            tracing::error!(
                order_id = %order.id,
                table = log.table(),
                previous,
                new,
                error = %e,
                "Failed to append status history, status change stands"
            );
        }
    }
}
