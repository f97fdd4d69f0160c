//! Typed access to the order tables through a [`Store`]
//!
//! Every order write is guarded by the `version` column. A guarded update
//! that matches nothing while the row still exists means someone else wrote
//! first, and is reported as `Conflict`.

use super::model::{
    DEFAULT_CURRENCY, FulfillmentException, NewOrder, Order, OrderDetails, OrderItem, OrderNote,
    Product, StatusHistoryEntry, from_record, to_record,
};
use crate::core::error::{OrderflowError, OrderflowResult};
use crate::core::store::{FetchOptions, Filter, Record, SortDirection, Store};
use crate::status::{FulfillmentStatus, OrderStatus, PaymentStatus};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub const ORDERS: &str = "orders";
pub const ORDER_ITEMS: &str = "order_items";
pub const ORDER_NOTES: &str = "order_notes";
pub const ORDER_HISTORY: &str = "order_history";
pub const FULFILLMENT_HISTORY: &str = "fulfillment_history";
pub const PRODUCTS: &str = "products";
pub const FULFILLMENT_EXCEPTIONS: &str = "fulfillment_exceptions";

/// Append-only audit logs, one per status dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLog {
    Order,
    Fulfillment,
}

impl HistoryLog {
    pub fn table(self) -> &'static str {
        match self {
            HistoryLog::Order => ORDER_HISTORY,
            HistoryLog::Fulfillment => FULFILLMENT_HISTORY,
        }
    }
}

fn by_id(id: Uuid) -> Filter {
    Filter::new().eq("id", id.to_string())
}

fn by_order(order_id: Uuid) -> Filter {
    Filter::new().eq("order_id", order_id.to_string())
}

fn oldest_first() -> FetchOptions {
    FetchOptions::new().order_by("created_at", SortDirection::Asc)
}

fn decode_all<T: serde::de::DeserializeOwned>(rows: Vec<Record>) -> OrderflowResult<Vec<T>> {
    rows.into_iter().map(from_record).collect()
}

#[derive(Clone)]
pub struct OrderRepository {
    store: Arc<dyn Store>,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn find(&self, id: Uuid) -> OrderflowResult<Option<Order>> {
        self.store
            .fetch_one(ORDERS, &by_id(id))
            .await?
            .map(from_record)
            .transpose()
    }

    /// Load an order or fail with `NotFound`
    pub async fn get(&self, id: Uuid) -> OrderflowResult<Order> {
        self.find(id)
            .await?
            .ok_or_else(|| OrderflowError::not_found(id))
    }

    pub async fn items(&self, order_id: Uuid) -> OrderflowResult<Vec<OrderItem>> {
        let rows = self
            .store
            .fetch_all(ORDER_ITEMS, &by_order(order_id), &oldest_first())
            .await?;
        decode_all(rows)
    }

    pub async fn notes(&self, order_id: Uuid, include_internal: bool) -> OrderflowResult<Vec<OrderNote>> {
        let rows = self
            .store
            .fetch_all(ORDER_NOTES, &by_order(order_id), &oldest_first())
            .await?;
        let notes: Vec<OrderNote> = decode_all(rows)?;

        Ok(notes
            .into_iter()
            .filter(|note| include_internal || !note.is_internal)
            .collect())
    }

    /// History entries in ascending creation order
    pub async fn history(&self, log: HistoryLog, order_id: Uuid) -> OrderflowResult<Vec<StatusHistoryEntry>> {
        let rows = self
            .store
            .fetch_all(log.table(), &by_order(order_id), &oldest_first())
            .await?;
        decode_all(rows)
    }

    pub async fn product(&self, id: Uuid) -> OrderflowResult<Option<Product>> {
        self.store
            .fetch_one(PRODUCTS, &by_id(id))
            .await?
            .map(from_record)
            .transpose()
    }

    pub async fn products_by_producer(&self, producer_id: Uuid) -> OrderflowResult<Vec<Product>> {
        let rows = self
            .store
            .fetch_all(
                PRODUCTS,
                &Filter::new().eq("producer_id", producer_id.to_string()),
                &FetchOptions::new(),
            )
            .await?;
        decode_all(rows)
    }

    /// Order lines for one product, across every order
    pub async fn items_for_product(&self, product_id: Uuid) -> OrderflowResult<Vec<OrderItem>> {
        let rows = self
            .store
            .fetch_all(
                ORDER_ITEMS,
                &Filter::new().eq("product_id", product_id.to_string()),
                &oldest_first(),
            )
            .await?;
        decode_all(rows)
    }

    pub async fn unresolved_exceptions(&self, order_id: Uuid) -> OrderflowResult<Vec<FulfillmentException>> {
        let rows = self
            .store
            .fetch_all(
                FULFILLMENT_EXCEPTIONS,
                &by_order(order_id).eq("resolved", false),
                &FetchOptions::new(),
            )
            .await?;
        decode_all(rows)
    }

    /// Insert an order with its items and the initial history entry
    pub async fn create(
        &self,
        new_order: NewOrder,
        customer_id: Uuid,
        created_by: Uuid,
    ) -> OrderflowResult<OrderDetails> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_id,
            producer_id: new_order.producer_id,
            status: OrderStatus::New,
            payment_status: new_order.payment_status.unwrap_or(PaymentStatus::Pending),
            fulfillment_status: FulfillmentStatus::Pending,
            total_amount: new_order.total_amount(),
            currency: new_order
                .currency
                .as_deref()
                .unwrap_or(DEFAULT_CURRENCY)
                .to_ascii_uppercase(),
            shipping_address: new_order.shipping_address.clone(),
            billing_address: new_order.billing_address.clone(),
            shipping_method_id: new_order.shipping_method_id.clone(),
            notes: new_order.notes.clone(),
            status_note: None,
            metadata: new_order.metadata.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert(ORDERS, to_record(&order)?).await?;
        let order: Order = from_record(stored)?;

        let mut items = Vec::with_capacity(new_order.items.len());
        for item in &new_order.items {
            let row = OrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                sku: item.sku.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price(),
                created_at: now,
            };
            let stored = self.store.insert(ORDER_ITEMS, to_record(&row)?).await?;
            items.push(from_record(stored)?);
        }

        let created = self
            .append_history(
                HistoryLog::Order,
                order.id,
                None,
                OrderStatus::New.as_str(),
                Some(created_by),
                Some("Order created".to_string()),
            )
            .await?;

        Ok(OrderDetails {
            order,
            items,
            notes: Vec::new(),
            history: vec![created],
        })
    }

    /// Apply `patch` only if the order is still at `expected_version`
    ///
    /// The version is bumped and `updated_at` refreshed as part of the write.
    pub async fn update_guarded(
        &self,
        id: Uuid,
        expected_version: i64,
        mut patch: Record,
    ) -> OrderflowResult<Order> {
        patch.insert("version".to_string(), json!(expected_version + 1));
        patch.insert("updated_at".to_string(), json!(Utc::now()));

        let guard = by_id(id).eq("version", expected_version);
        match self.store.update(ORDERS, &guard, patch).await? {
            Some(row) => from_record(row),
            None if self.find(id).await?.is_some() => {
                tracing::warn!(order_id = %id, expected_version, "Concurrent order update detected");
                Err(OrderflowError::Conflict { id })
            }
            None => Err(OrderflowError::not_found(id)),
        }
    }

    pub async fn append_history(
        &self,
        log: HistoryLog,
        order_id: Uuid,
        previous_status: Option<&str>,
        new_status: &str,
        changed_by: Option<Uuid>,
        notes: Option<String>,
    ) -> OrderflowResult<StatusHistoryEntry> {
        let entry = StatusHistoryEntry {
            id: Uuid::new_v4(),
            order_id,
            previous_status: previous_status.map(str::to_string),
            new_status: new_status.to_string(),
            changed_by,
            notes,
            created_at: Utc::now(),
        };

        let stored = self.store.insert(log.table(), to_record(&entry)?).await?;
        from_record(stored)
    }

    pub async fn add_note(
        &self,
        order_id: Uuid,
        author_id: Uuid,
        content: impl Into<String>,
        is_internal: bool,
    ) -> OrderflowResult<OrderNote> {
        let note = OrderNote {
            id: Uuid::new_v4(),
            order_id,
            author_id,
            content: content.into(),
            is_internal,
            created_at: Utc::now(),
        };

        let stored = self.store.insert(ORDER_NOTES, to_record(&note)?).await?;
        from_record(stored)
    }

    /// Delete an order and everything that references it
    ///
    /// Returns `false` when the order did not exist.
    pub async fn delete_cascade(&self, id: Uuid) -> OrderflowResult<bool> {
        for table in [ORDER_ITEMS, ORDER_NOTES, ORDER_HISTORY, FULFILLMENT_HISTORY] {
            self.store.delete(table, &by_order(id)).await?;
        }
        Ok(self.store.delete(ORDERS, &by_id(id)).await?)
    }
}
