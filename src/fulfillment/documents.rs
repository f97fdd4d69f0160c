//! Warehouse documents: producer pick lists and order packing slips
//!
//! Both are read-only projections over the stored orders. Nothing here
//! changes a status or writes a row.

use crate::core::auth::{Actor, Role};
use crate::core::error::{OrderflowError, OrderflowResult};
use crate::orders::{Order, OrderItem, OrderRepository};
use crate::status::{FulfillmentStatus, OrderStatus};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Orders in these statuses can be put on a packing slip
pub const PACKABLE_ORDER_STATUSES: [OrderStatus; 3] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
];

const PICKABLE_ORDER_STATUSES: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Processing];
const PICKABLE_FULFILLMENT_STATUSES: [FulfillmentStatus; 2] =
    [FulfillmentStatus::Pending, FulfillmentStatus::Processing];

const SLIP_NOTE: &str =
    "Thank you for your order! If you have any questions, please contact customer service.";
const PICKUP_NOTE: &str = " For local pickup, please bring a valid ID.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickListItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub location: Option<String>,
    /// Special handling instructions from the product metadata
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PickList {
    pub id: Uuid,
    pub producer_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub items: Vec<PickListItem>,
    pub total_items: usize,
    /// Orders whose lines were aggregated into this list
    pub order_ids: Vec<Uuid>,
    pub notes: Option<String>,
    pub status: FulfillmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackingSlipItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackingSlip {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub shipping_address: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<PackingSlipItem>,
    pub total_items: usize,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub notes: String,
    pub pickup_instructions: Option<String>,
}

fn require_staff(actor: &Actor, what: &str) -> OrderflowResult<()> {
    if actor.role.at_least(Role::Staff) {
        Ok(())
    } else {
        Err(OrderflowError::Forbidden(format!(
            "Only staff can generate {}",
            what
        )))
    }
}

fn is_pickable(order: &Order) -> bool {
    PICKABLE_ORDER_STATUSES.contains(&order.status)
        && PICKABLE_FULFILLMENT_STATUSES.contains(&order.fulfillment_status)
}

/// Decimal stored either as a JSON string or number
fn decimal_value(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::String(s)) => Decimal::from_str(s).unwrap_or_default(),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

fn string_field(map: Option<&Value>, key: &str) -> Option<String> {
    map.and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Builds pick lists and packing slips from the order tables
#[derive(Clone)]
pub struct FulfillmentDocuments {
    repository: OrderRepository,
    pickup_method_ids: Vec<String>,
}

impl FulfillmentDocuments {
    pub fn new(repository: OrderRepository, pickup_method_ids: Vec<String>) -> Self {
        Self {
            repository,
            pickup_method_ids,
        }
    }

    /// Everything a producer has to pick for orders awaiting fulfillment
    ///
    /// Quantities are summed per product across every pickable order, and
    /// lines are sorted by shelf location so the picker walks the store
    /// once. Products without a location come last.
    pub async fn producer_pick_list(
        &self,
        producer_id: Uuid,
        actor: &Actor,
    ) -> OrderflowResult<PickList> {
        require_staff(actor, "pick lists")?;

        let mut pick_list = PickList {
            id: Uuid::new_v4(),
            producer_id,
            created_at: Utc::now(),
            items: Vec::new(),
            total_items: 0,
            order_ids: Vec::new(),
            notes: None,
            status: FulfillmentStatus::Pending,
        };

        let products = self.repository.products_by_producer(producer_id).await?;
        if products.is_empty() {
            pick_list.notes = Some("No products found for this producer".to_string());
            return Ok(pick_list);
        }

        let mut orders: HashMap<Uuid, bool> = HashMap::new();
        let mut order_ids = Vec::new();
        let mut quantities: IndexMap<Uuid, i64> = IndexMap::new();

        for product in &products {
            for item in self.repository.items_for_product(product.id).await? {
                let pickable = match orders.get(&item.order_id) {
                    Some(pickable) => *pickable,
                    None => {
                        let pickable = self
                            .repository
                            .find(item.order_id)
                            .await?
                            .is_some_and(|order| is_pickable(&order));
                        orders.insert(item.order_id, pickable);
                        if pickable {
                            order_ids.push(item.order_id);
                        }
                        pickable
                    }
                };
                if pickable {
                    *quantities.entry(product.id).or_insert(0) += i64::from(item.quantity);
                }
            }
        }

        let mut items: Vec<PickListItem> = products
            .into_iter()
            .filter_map(|product| {
                let quantity = quantities.get(&product.id).copied()?;
                let notes = product
                    .metadata
                    .get("special_handling")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some(PickListItem {
                    product_id: product.id,
                    product_name: product.name,
                    sku: product.sku,
                    quantity,
                    location: product.location,
                    notes,
                })
            })
            .collect();

        if items.is_empty() {
            pick_list.notes = Some("No pending orders that need fulfillment".to_string());
            return Ok(pick_list);
        }

        items.sort_by(|a, b| {
            (a.location.is_none(), &a.location, &a.product_name).cmp(&(
                b.location.is_none(),
                &b.location,
                &b.product_name,
            ))
        });

        tracing::debug!(
            producer_id = %producer_id,
            lines = items.len(),
            orders = order_ids.len(),
            "Pick list generated"
        );

        pick_list.total_items = items.len();
        pick_list.items = items;
        pick_list.order_ids = order_ids;
        Ok(pick_list)
    }

    /// Packing slip for one order
    ///
    /// The customer name comes from the shipping address. Shipping cost and
    /// pickup instructions are read from the order metadata.
    pub async fn order_packing_slip(
        &self,
        order_id: Uuid,
        actor: &Actor,
    ) -> OrderflowResult<PackingSlip> {
        require_staff(actor, "packing slips")?;

        let order = self.repository.get(order_id).await?;
        if !PACKABLE_ORDER_STATUSES.contains(&order.status) {
            let allowed: Vec<&str> = PACKABLE_ORDER_STATUSES.iter().map(|s| s.as_str()).collect();
            return Err(OrderflowError::BadRequest(format!(
                "Cannot generate packing slip for order with status '{}'. Order must be in one of these statuses: {}",
                order.status,
                allowed.join(", ")
            )));
        }

        let items = self.repository.items(order.id).await?;
        if items.is_empty() {
            return Err(OrderflowError::BadRequest(format!(
                "Order with ID '{}' has no items",
                order.id
            )));
        }

        let items: Vec<PackingSlipItem> = items.into_iter().map(PackingSlipItem::from).collect();
        let subtotal: Decimal = items.iter().map(|item| item.total_price).sum();
        let shipping_cost = decimal_value(order.metadata.get("shipping_cost"));

        let is_pickup = order
            .shipping_method_id
            .as_deref()
            .is_some_and(|method| self.pickup_method_ids.iter().any(|p| p == method));
        let mut notes = SLIP_NOTE.to_string();
        if is_pickup {
            notes.push_str(PICKUP_NOTE);
        }

        let address = order.shipping_address.as_ref();
        let customer_name = string_field(address, "full_name")
            .or_else(|| string_field(address, "name"))
            .unwrap_or_else(|| "Customer".to_string());

        Ok(PackingSlip {
            id: Uuid::new_v4(),
            order_id: order.id,
            customer_id: order.customer_id,
            customer_name,
            shipping_address: order.shipping_address.clone(),
            created_at: Utc::now(),
            total_items: items.len(),
            items,
            subtotal,
            shipping_cost,
            total_amount: subtotal + shipping_cost,
            currency: order.currency.clone(),
            notes,
            pickup_instructions: order
                .metadata
                .get("pickup_instructions")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

impl From<OrderItem> for PackingSlipItem {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name,
            sku: item.sku,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_value_accepts_strings_and_numbers() {
        assert_eq!(decimal_value(Some(&json!("49.00"))), Decimal::new(4900, 2));
        assert_eq!(decimal_value(Some(&json!(15))), Decimal::from(15));
        assert_eq!(decimal_value(Some(&json!("free"))), Decimal::ZERO);
        assert_eq!(decimal_value(None), Decimal::ZERO);
    }

    #[test]
    fn test_string_field_skips_blank() {
        let address = json!({"name": "  ", "full_name": "Aino Niemi"});
        assert_eq!(string_field(Some(&address), "name"), None);
        assert_eq!(
            string_field(Some(&address), "full_name").as_deref(),
            Some("Aino Niemi")
        );
        assert_eq!(string_field(None, "name"), None);
    }

    #[test]
    fn test_documents_require_staff() {
        let customer = Actor::new(Uuid::new_v4(), "c@example.com", Role::Customer);
        assert!(matches!(
            require_staff(&customer, "pick lists"),
            Err(OrderflowError::Forbidden(_))
        ));
        let producer = Actor::new(Uuid::new_v4(), "p@example.com", Role::Staff);
        assert!(require_staff(&producer, "pick lists").is_ok());
    }
}
