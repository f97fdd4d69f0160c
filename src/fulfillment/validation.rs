//! Fulfillment prerequisite checks and the administrative override
//!
//! Every check runs on every call, in a fixed order, so one report shows
//! every problem at once. A failing check is data; only store failures
//! surface as errors.

use crate::config::ValidationSettings;
use crate::core::auth::Actor;
use crate::core::error::{OrderflowError, OrderflowResult};
use crate::orders::{Order, OrderItem, OrderRepository};
use crate::status::OrderStatus;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const ORDER_STATUS_ELIGIBLE: &str = "order_status_eligible";
pub const HAS_ITEMS: &str = "has_items";
pub const ITEMS_IN_STOCK: &str = "items_in_stock";
pub const SHIPPING_ADDRESS_COMPLETE: &str = "shipping_address_complete";
pub const PAYMENT_STATUS_COMPATIBLE: &str = "payment_status_compatible";
pub const NO_UNRESOLVED_EXCEPTIONS: &str = "no_unresolved_exceptions";
pub const TOTALS_CONSISTENT: &str = "totals_consistent";

/// Result of one named check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub reason: String,
}

impl CheckResult {
    pub fn pass(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            reason: reason.into(),
        }
    }

    pub fn fail(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            reason: reason.into(),
        }
    }

    fn from_failures(name: &str, ok_reason: &str, prefix: &str, failures: Vec<String>) -> Self {
        if failures.is_empty() {
            Self::pass(name, ok_reason)
        } else {
            Self::fail(name, format!("{}: {}", prefix, failures.join(", ")))
        }
    }
}

/// Who forced a failing report through, when and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOverride {
    pub overridden_by: Uuid,
    pub reason: String,
    pub overridden_at: DateTime<Utc>,
    /// Names of the checks that were failing when the override was applied
    pub failed_checks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub order_id: Uuid,
    pub is_valid: bool,
    pub validated_at: DateTime<Utc>,
    pub checks: Vec<CheckResult>,
    #[serde(rename = "override", default, skip_serializing_if = "Option::is_none")]
    pub override_info: Option<ValidationOverride>,
}

impl ValidationReport {
    pub fn new(order_id: Uuid, checks: Vec<CheckResult>) -> Self {
        Self {
            order_id,
            is_valid: checks.iter().all(|check| check.passed),
            validated_at: Utc::now(),
            checks,
            override_info: None,
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|check| check.name == name)
    }

    pub fn failed_checks(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|check| !check.passed)
            .map(|check| check.name.clone())
            .collect()
    }
}

/// Force a report to pass without re-running its checks
///
/// Admin only. The original check results are kept and the failing ones
/// are listed in the override for audit.
pub fn override_validation(
    report: ValidationReport,
    actor: &Actor,
    reason: &str,
) -> OrderflowResult<ValidationReport> {
    if !actor.is_admin() {
        return Err(OrderflowError::Forbidden(
            "Only administrators can override fulfillment validation".to_string(),
        ));
    }

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(OrderflowError::BadRequest(
            "An override reason is required".to_string(),
        ));
    }

    let failed_checks = report.failed_checks();
    Ok(ValidationReport {
        is_valid: true,
        override_info: Some(ValidationOverride {
            overridden_by: actor.id,
            reason: reason.to_string(),
            overridden_at: Utc::now(),
            failed_checks,
        }),
        ..report
    })
}

/// Runs the prerequisite battery against stored orders
#[derive(Clone)]
pub struct PrerequisiteValidator {
    repository: OrderRepository,
    settings: ValidationSettings,
}

impl PrerequisiteValidator {
    pub fn new(repository: OrderRepository, settings: ValidationSettings) -> Self {
        Self {
            repository,
            settings,
        }
    }

    /// Validate a stored order by id
    pub async fn validate(&self, order_id: Uuid) -> OrderflowResult<ValidationReport> {
        let order = self.repository.get(order_id).await?;
        self.validate_order(&order).await
    }

    /// Validate an already loaded order
    pub async fn validate_order(&self, order: &Order) -> OrderflowResult<ValidationReport> {
        let items = self.repository.items(order.id).await?;

        let mut checks = vec![
            check_status(order.status),
            check_has_items(&items),
            self.check_stock(&items).await?,
            self.check_shipping_address(order),
            self.check_payment(order),
            self.check_exceptions(order.id).await?,
        ];
        if self.settings.check_totals {
            checks.push(check_totals(order, &items));
        }

        let report = ValidationReport::new(order.id, checks);
        tracing::debug!(
            order_id = %order.id,
            is_valid = report.is_valid,
            failed = ?report.failed_checks(),
            "Fulfillment prerequisites evaluated"
        );
        Ok(report)
    }

    /// Demand is summed per product, so split lines cannot each pass alone
    async fn check_stock(&self, items: &[OrderItem]) -> OrderflowResult<CheckResult> {
        let mut demand: IndexMap<Uuid, (&str, i64)> = IndexMap::new();
        for item in items {
            let entry = demand
                .entry(item.product_id)
                .or_insert((item.product_name.as_str(), 0));
            entry.1 += i64::from(item.quantity);
        }

        let mut shortages = Vec::new();
        for (product_id, (name, requested)) in demand {
            match self.repository.product(product_id).await? {
                None => shortages.push(format!("{} (product not found)", name)),
                Some(product) if product.stock_quantity < requested => shortages.push(format!(
                    "{} (requested {}, in stock {})",
                    name, requested, product.stock_quantity
                )),
                Some(_) => {}
            }
        }

        Ok(CheckResult::from_failures(
            ITEMS_IN_STOCK,
            "All items are in stock",
            "Insufficient stock",
            shortages,
        ))
    }

    fn check_shipping_address(&self, order: &Order) -> CheckResult {
        let is_pickup = order
            .shipping_method_id
            .as_deref()
            .is_some_and(|method| self.settings.pickup_method_ids.iter().any(|p| p == method));
        if is_pickup {
            return CheckResult::pass(
                SHIPPING_ADDRESS_COMPLETE,
                "Local pickup, no shipping address required",
            );
        }

        let Some(Value::Object(address)) = &order.shipping_address else {
            return CheckResult::fail(SHIPPING_ADDRESS_COMPLETE, "Shipping address is missing");
        };

        let missing = self
            .settings
            .required_address_fields
            .iter()
            .filter(|field| match address.get(field.as_str()) {
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(Value::Null) | None => true,
                Some(_) => false,
            })
            .cloned()
            .collect();

        CheckResult::from_failures(
            SHIPPING_ADDRESS_COMPLETE,
            "Shipping address is complete",
            "Shipping address is missing fields",
            missing,
        )
    }

    fn check_payment(&self, order: &Order) -> CheckResult {
        if self
            .settings
            .accepted_payment_statuses
            .contains(&order.payment_status)
        {
            CheckResult::pass(
                PAYMENT_STATUS_COMPATIBLE,
                format!("Payment status '{}' allows fulfillment", order.payment_status),
            )
        } else {
            CheckResult::fail(
                PAYMENT_STATUS_COMPATIBLE,
                format!(
                    "Payment status '{}' does not allow fulfillment",
                    order.payment_status
                ),
            )
        }
    }

    async fn check_exceptions(&self, order_id: Uuid) -> OrderflowResult<CheckResult> {
        let open = self
            .repository
            .unresolved_exceptions(order_id)
            .await?
            .into_iter()
            .map(|exception| exception.kind)
            .collect();

        Ok(CheckResult::from_failures(
            NO_UNRESOLVED_EXCEPTIONS,
            "No unresolved exceptions",
            "Unresolved exceptions",
            open,
        ))
    }
}

fn check_status(status: OrderStatus) -> CheckResult {
    match status {
        OrderStatus::New | OrderStatus::Pending | OrderStatus::Processing => CheckResult::pass(
            ORDER_STATUS_ELIGIBLE,
            format!("Order status '{}' allows fulfillment", status),
        ),
        _ => CheckResult::fail(
            ORDER_STATUS_ELIGIBLE,
            format!("Order status '{}' does not allow fulfillment", status),
        ),
    }
}

fn check_has_items(items: &[OrderItem]) -> CheckResult {
    if items.is_empty() {
        CheckResult::fail(HAS_ITEMS, "Order has no items")
    } else {
        CheckResult::pass(HAS_ITEMS, format!("Order has {} item(s)", items.len()))
    }
}

fn check_totals(order: &Order, items: &[OrderItem]) -> CheckResult {
    let items_total: Decimal = items.iter().map(|item| item.total_price).sum();
    if items_total == order.total_amount {
        CheckResult::pass(TOTALS_CONSISTENT, "Item totals match the order total")
    } else {
        CheckResult::fail(
            TOTALS_CONSISTENT,
            format!(
                "Item totals {} do not match the order total {}",
                items_total, order.total_amount
            ),
        )
    }
}
