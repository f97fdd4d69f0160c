//! Shared fixtures for the integration tests
//!
//! Builds the services on top of an `InMemoryStore` the test can also
//! reach directly, for seeding products and exceptions or forcing an
//! order into a given state.

#![allow(dead_code)]

use orderflow::config::ValidationSettings;
use orderflow::core::store::{Filter, Store};
use orderflow::orders::repository::{FULFILLMENT_EXCEPTIONS, ORDERS, PRODUCTS};
use orderflow::prelude::*;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<dyn Store>,
    pub repository: OrderRepository,
    pub status: StatusService,
    pub orders: OrderService,
    pub timeline: TimelineProjector,
    pub documents: FulfillmentDocuments,
    pub events: EventBus,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let repository = OrderRepository::new(store.clone());
        let settings = ValidationSettings::default();
        let validator = PrerequisiteValidator::new(repository.clone(), settings.clone());
        let events = EventBus::new(64);

        Self {
            status: StatusService::new(repository.clone(), validator, events.clone()),
            orders: OrderService::new(repository.clone()),
            timeline: TimelineProjector::new(repository.clone()),
            documents: FulfillmentDocuments::new(repository.clone(), settings.pickup_method_ids),
            repository,
            store,
            events,
        }
    }

    pub async fn seed_product(&self, stock: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert(
                PRODUCTS,
                record(json!({
                    "id": id,
                    "name": "Cloudberry jam",
                    "sku": "CB-250",
                    "stock_quantity": stock
                })),
            )
            .await
            .expect("seed product");
        id
    }

    /// Product supplied by `producer_id`, picked from `location`
    pub async fn seed_producer_product(
        &self,
        producer_id: Uuid,
        name: &str,
        location: Option<&str>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert(
                PRODUCTS,
                record(json!({
                    "id": id,
                    "name": name,
                    "stock_quantity": 100,
                    "producer_id": producer_id,
                    "location": location,
                    "metadata": {"special_handling": "Keep chilled"}
                })),
            )
            .await
            .expect("seed producer product");
        id
    }

    pub async fn seed_exception(&self, order_id: Uuid, kind: &str) {
        self.store
            .insert(
                FULFILLMENT_EXCEPTIONS,
                record(json!({
                    "id": Uuid::new_v4(),
                    "order_id": order_id,
                    "kind": kind,
                    "description": "raised by warehouse",
                    "resolved": false
                })),
            )
            .await
            .expect("seed exception");
    }

    /// Order that passes every prerequisite check
    pub async fn ready_order(&self, customer: &Actor) -> Order {
        let product_id = self.seed_product(10).await;
        self.create_order(customer, product_id, Some(PaymentStatus::Paid), Some(address()))
            .await
    }

    pub async fn create_order(
        &self,
        customer: &Actor,
        product_id: Uuid,
        payment_status: Option<PaymentStatus>,
        shipping_address: Option<Value>,
    ) -> Order {
        self.create_order_with_items(
            customer,
            vec![item(product_id, 2)],
            payment_status,
            shipping_address,
        )
        .await
    }

    pub async fn create_order_with_items(
        &self,
        customer: &Actor,
        items: Vec<NewOrderItem>,
        payment_status: Option<PaymentStatus>,
        shipping_address: Option<Value>,
    ) -> Order {
        let new_order = NewOrder {
            customer_id: None,
            producer_id: Some(Uuid::new_v4()),
            items,
            currency: None,
            payment_status,
            shipping_address,
            billing_address: None,
            shipping_method_id: None,
            notes: None,
            metadata: Default::default(),
        };

        self.orders
            .create_order(customer, new_order)
            .await
            .expect("create order")
            .order
    }

    /// Write statuses straight to the store, bypassing the state machines
    pub async fn force(&self, order_id: Uuid, fields: Value) {
        self.store
            .update(ORDERS, &Filter::new().eq("id", order_id.to_string()), record(fields))
            .await
            .expect("force order state")
            .expect("order exists");
    }
}

/// One line of cloudberry jam at 69.50
pub fn item(product_id: Uuid, quantity: u32) -> NewOrderItem {
    NewOrderItem {
        product_id,
        product_name: "Cloudberry jam".to_string(),
        sku: Some("CB-250".to_string()),
        quantity,
        unit_price: Decimal::new(6950, 2),
    }
}

pub fn actor(role: Role) -> Actor {
    Actor::new(Uuid::new_v4(), format!("{}@example.com", role), role)
}

pub fn address() -> Value {
    json!({
        "street": "Storgatan 1",
        "city": "Umeå",
        "postal_code": "903 26",
        "country": "SE"
    })
}

pub fn record(value: Value) -> orderflow::core::store::Record {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected a JSON object, got {}", other),
    }
}
