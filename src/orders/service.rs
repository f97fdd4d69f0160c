//! Order creation, details, notes and administrative delete

use super::model::{NewOrder, OrderDetails, OrderNote};
use super::repository::{HistoryLog, OrderRepository};
use crate::core::auth::{Actor, Role};
use crate::core::error::{OrderflowError, OrderflowResult};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct OrderService {
    repository: OrderRepository,
}

impl OrderService {
    pub fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }

    /// Create an order in `new` / fulfillment `pending`
    ///
    /// Customers always order for themselves. Staff and admins may order on
    /// behalf of a named customer.
    pub async fn create_order(&self, actor: &Actor, new_order: NewOrder) -> OrderflowResult<OrderDetails> {
        new_order.validate()?;

        let customer_id = match (actor.role, new_order.customer_id) {
            (Role::Customer, _) | (_, None) => actor.id,
            (_, Some(customer_id)) => customer_id,
        };

        let details = self.repository.create(new_order, customer_id, actor.id).await?;
        tracing::info!(
            order_id = %details.order.id,
            customer_id = %customer_id,
            actor_id = %actor.id,
            total = %details.order.total_amount,
            items = details.items.len(),
            "Order created"
        );
        Ok(details)
    }

    /// Order with items, notes and order history
    ///
    /// Customers only see their own orders and never see internal notes.
    pub async fn get_order_details(&self, order_id: Uuid, actor: &Actor) -> OrderflowResult<OrderDetails> {
        let order = self.repository.get(order_id).await?;
        if !actor.can_access(order.customer_id) {
            return Err(OrderflowError::not_found(order_id));
        }

        let include_internal = actor.role.at_least(Role::Staff);
        let items = self.repository.items(order_id).await?;
        let notes = self.repository.notes(order_id, include_internal).await?;
        let history = self.repository.history(HistoryLog::Order, order_id).await?;

        Ok(OrderDetails {
            order,
            items,
            notes,
            history,
        })
    }

    pub async fn add_note(
        &self,
        order_id: Uuid,
        actor: &Actor,
        content: &str,
        is_internal: bool,
    ) -> OrderflowResult<OrderNote> {
        let content = content.trim();
        if content.is_empty() {
            return Err(OrderflowError::BadRequest(
                "Note content is required".to_string(),
            ));
        }
        if is_internal && !actor.role.at_least(Role::Staff) {
            return Err(OrderflowError::Forbidden(
                "Only staff can write internal notes".to_string(),
            ));
        }

        let order = self.repository.get(order_id).await?;
        if !actor.can_access(order.customer_id) {
            return Err(OrderflowError::not_found(order_id));
        }

        self.repository
            .add_note(order_id, actor.id, content, is_internal)
            .await
    }

    /// Delete an order with its items, notes and history
    pub async fn delete_order(&self, order_id: Uuid, actor: &Actor) -> OrderflowResult<()> {
        if !actor.is_admin() {
            return Err(OrderflowError::Forbidden(
                "Only administrators can delete orders".to_string(),
            ));
        }

        if !self.repository.delete_cascade(order_id).await? {
            return Err(OrderflowError::not_found(order_id));
        }

        tracing::warn!(order_id = %order_id, actor_id = %actor.id, "Order deleted");
        Ok(())
    }
}
