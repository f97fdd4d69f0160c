//! Order rows, their repository and order-level operations

pub mod model;
pub mod repository;
pub mod service;

pub use model::{
    FulfillmentException, NewOrder, NewOrderItem, Order, OrderDetails, OrderItem, OrderNote,
    Product, StatusHistoryEntry,
};
pub use repository::{HistoryLog, OrderRepository};
pub use service::OrderService;
