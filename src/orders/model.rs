//! Order aggregate and the rows that hang off it
//!
//! Rows are stored as JSON records; these types are their typed views.

use crate::core::error::{OrderflowError, OrderflowResult};
use crate::core::store::Record;
use crate::status::{FulfillmentStatus, OrderStatus, PaymentStatus, StatusSnapshot};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const DEFAULT_CURRENCY: &str = "SEK";

/// Metadata key under which a recorded validation override lives
pub const VALIDATION_OVERRIDE_KEY: &str = "validation_override";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Recipient of producer-facing notifications
    #[serde(default)]
    pub producer_id: Option<Uuid>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub total_amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub shipping_address: Option<Value>,
    #[serde(default)]
    pub billing_address: Option<Value>,
    #[serde(default)]
    pub shipping_method_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Last composed audit note
    #[serde(default)]
    pub status_note: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Bumped on every write, used as the optimistic concurrency guard
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            fulfillment_status: self.fulfillment_status,
            payment_status: self.payment_status,
        }
    }

    pub fn validation_override(&self) -> Option<&Value> {
        self.metadata.get(VALIDATION_OVERRIDE_KEY)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderNote {
    pub id: Uuid,
    pub order_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

/// One row of `order_history` or `fulfillment_history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    #[serde(default)]
    pub previous_status: Option<String>,
    pub new_status: String,
    #[serde(default)]
    pub changed_by: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub producer_id: Option<Uuid>,
    /// Shelf or bin the product is picked from
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A problem raised against an order by warehouse tooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentException {
    pub id: Uuid,
    pub order_id: Uuid,
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resolved: bool,
}

/// Order with everything a details view needs
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub notes: Vec<OrderNote>,
    pub history: Vec<StatusHistoryEntry>,
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

fn validate_currency(value: &str) -> Result<(), ValidationError> {
    if value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ValidationError::new("currency_code"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "Product name is required"))]
    pub product_name: String,
    pub sku: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    #[validate(custom(function = "validate_non_negative"))]
    pub unit_price: Decimal,
}

impl NewOrderItem {
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Body of `POST /orders`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewOrder {
    /// Ignored for customers, who always order for themselves
    pub customer_id: Option<Uuid>,
    pub producer_id: Option<Uuid>,
    #[validate(length(min = 1, message = "An order needs at least one item"), nested)]
    pub items: Vec<NewOrderItem>,
    #[validate(custom(function = "validate_currency"))]
    pub currency: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub shipping_address: Option<Value>,
    pub billing_address: Option<Value>,
    pub shipping_method_id: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NewOrder {
    pub fn total_amount(&self) -> Decimal {
        self.items.iter().map(NewOrderItem::total_price).sum()
    }
}

/// Decode a stored row into its typed view
pub fn from_record<T: DeserializeOwned>(record: Record) -> OrderflowResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Encode a typed row for the store
pub fn to_record<T: Serialize>(value: &T) -> OrderflowResult<Record> {
    match serde_json::to_value(value)? {
        Value::Object(record) => Ok(record),
        other => Err(OrderflowError::Infrastructure(format!(
            "Expected an object row, got {}",
            other
        ))),
    }
}
