//! Status transition orchestration against the in-memory store
//!
//! These tests verify that:
//! - Role and adjacency rules are enforced end to end
//! - Reconciliation keeps the order, fulfillment and payment statuses coherent
//! - The prerequisite gate, override and skip paths behave as documented
//! - History and notifications are best-effort after the commit point

mod common;

use async_trait::async_trait;
use common::{Harness, actor, address, item};
use orderflow::core::store::{FetchOptions, Filter, Record, Store};
use orderflow::fulfillment::validation::{
    ITEMS_IN_STOCK, NO_UNRESOLVED_EXCEPTIONS, PAYMENT_STATUS_COMPATIBLE,
};
use orderflow::orders::HistoryLog;
use orderflow::orders::repository::{FULFILLMENT_HISTORY, ORDER_HISTORY};
use orderflow::prelude::*;
use orderflow::status::StatusDimension;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

// =============================================================================
// Order status
// =============================================================================

mod order_status_tests {
    use super::*;

    #[tokio::test]
    async fn test_customer_confirms_new_order() {
        let h = Harness::new();
        let customer = actor(Role::Customer);
        let order = h.ready_order(&customer).await;

        let updated = assert_ok!(
            h.status
                .transition_order_status(order.id, "pending", &customer, None)
                .await
        );
        assert_eq!(updated.status, OrderStatus::Pending);
        assert_eq!(updated.version, order.version + 1);

        let history = h.repository.history(HistoryLog::Order, order.id).await.unwrap();
        assert_eq!(history.len(), 2);
        let last = history.last().unwrap();
        assert_eq!(last.previous_status.as_deref(), Some("new"));
        assert_eq!(last.new_status, "pending");
        assert_eq!(last.changed_by, Some(customer.id));
    }

    #[tokio::test]
    async fn test_customer_cannot_start_processing() {
        let h = Harness::new();
        let customer = actor(Role::Customer);
        let order = h.ready_order(&customer).await;
        h.force(order.id, json!({"status": "pending"})).await;

        let result = h
            .status
            .transition_order_status(order.id, "processing", &customer, None)
            .await;

        match result {
            Err(OrderflowError::Forbidden(reason)) => assert_eq!(
                reason,
                "User with role 'customer' cannot transition from 'pending' to 'processing'"
            ),
            other => panic!("Expected Forbidden, got {:?}", other),
        }
        assert_eq!(
            h.repository.get(order.id).await.unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_skipping_ahead_lists_valid_transitions() {
        let h = Harness::new();
        let admin = actor(Role::Admin);
        let order = h.ready_order(&actor(Role::Customer)).await;

        let result = h
            .status
            .transition_order_status(order.id, "delivered", &admin, None)
            .await;

        match result {
            Err(OrderflowError::BadRequest(reason)) => assert_eq!(
                reason,
                "Cannot transition from 'new' to 'delivered'. Valid transitions: pending, cancelled"
            ),
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_status_value_is_bad_request() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;

        let result = h
            .status
            .transition_order_status(order.id, "teleported", &actor(Role::Admin), None)
            .await;
        assert!(matches!(result, Err(OrderflowError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let h = Harness::new();
        let result = h
            .status
            .transition_order_status(Uuid::new_v4(), "pending", &actor(Role::Admin), None)
            .await;
        assert!(matches!(result, Err(OrderflowError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_caller_notes_replace_composed_note() {
        let h = Harness::new();
        let customer = actor(Role::Customer);
        let order = h.ready_order(&customer).await;

        let updated = h
            .status
            .transition_order_status(order.id, "pending", &customer, Some("Paid by invoice".into()))
            .await
            .unwrap();
        assert_eq!(updated.status_note.as_deref(), Some("Paid by invoice"));

        let composed = h
            .status
            .transition_order_status(order.id, "cancelled", &customer, Some("   ".into()))
            .await
            .unwrap();
        assert_eq!(
            composed.status_note.as_deref(),
            Some(
                "Status changed from 'pending' (Order has been confirmed and is awaiting processing.) \
                 to 'cancelled' (Order has been cancelled.)"
            )
        );
    }
}

// =============================================================================
// Ownership
// =============================================================================

mod ownership_tests {
    use super::*;

    #[tokio::test]
    async fn test_other_customer_cannot_cancel() {
        let h = Harness::new();
        let owner = actor(Role::Customer);
        let stranger = actor(Role::Customer);
        let order = h.ready_order(&owner).await;

        let result = h
            .status
            .cancel_order(order.id, &stranger, Some("not mine".into()))
            .await;
        assert!(matches!(result, Err(OrderflowError::NotFound { .. })));

        let unchanged = h.repository.get(order.id).await.unwrap();
        assert_eq!(unchanged.status, OrderStatus::New);
        assert_eq!(unchanged.payment_status, PaymentStatus::Paid);
        assert_eq!(unchanged.version, order.version);
        assert_eq!(
            h.repository.history(HistoryLog::Order, order.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_other_customer_cannot_confirm() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;

        let result = h
            .status
            .transition_order_status(order.id, "pending", &actor(Role::Customer), None)
            .await;
        assert!(matches!(result, Err(OrderflowError::NotFound { .. })));
        assert_eq!(
            h.repository.get(order.id).await.unwrap().status,
            OrderStatus::New
        );
    }

    #[tokio::test]
    async fn test_staff_may_move_any_order() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;

        let updated = assert_ok!(
            h.status
                .transition_order_status(order.id, "pending", &actor(Role::Staff), None)
                .await
        );
        assert_eq!(updated.status, OrderStatus::Pending);
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

mod reconciliation_tests {
    use super::*;

    #[tokio::test]
    async fn test_admin_cancel_refunds_paid_order() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;
        h.force(order.id, json!({"status": "processing", "fulfillment_status": "picked"}))
            .await;

        let cancelled = assert_ok!(
            h.status
                .cancel_order(order.id, &actor(Role::Admin), Some("Customer request".into()))
                .await
        );

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(cancelled.fulfillment_status, FulfillmentStatus::Cancelled);

        let fulfillment = h
            .repository
            .history(HistoryLog::Fulfillment, order.id)
            .await
            .unwrap();
        assert_eq!(fulfillment.len(), 1);
        assert_eq!(fulfillment[0].previous_status.as_deref(), Some("picked"));
        assert!(
            fulfillment[0]
                .notes
                .as_deref()
                .unwrap()
                .ends_with("Follows order status 'cancelled'")
        );
    }

    #[tokio::test]
    async fn test_unpaid_cancel_leaves_payment_alone() {
        let h = Harness::new();
        let customer = actor(Role::Customer);
        let product_id = h.seed_product(5).await;
        let order = h.create_order(&customer, product_id, None, Some(address())).await;

        let cancelled = h.status.cancel_order(order.id, &customer, None).await.unwrap();
        assert_eq!(cancelled.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_fulfillment_drives_order_to_delivered() {
        let h = Harness::new();
        let staff = actor(Role::Staff);
        let order = h.ready_order(&actor(Role::Customer)).await;
        h.force(order.id, json!({"status": "processing"})).await;

        for next in ["processing", "picked", "packed", "ready"] {
            let outcome = h
                .status
                .update_fulfillment_status(order.id, next, &staff, None, false)
                .await
                .unwrap();
            assert!(matches!(outcome, FulfillmentOutcome::Updated(_)), "{}", next);
        }
        assert_eq!(
            h.repository.get(order.id).await.unwrap().status,
            OrderStatus::Processing
        );

        let shipped = match h
            .status
            .update_fulfillment_status(order.id, "shipped", &staff, None, false)
            .await
            .unwrap()
        {
            FulfillmentOutcome::Updated(order) => order,
            other => panic!("Expected update, got {:?}", other),
        };
        assert_eq!(shipped.status, OrderStatus::Shipped);

        let completed = match h
            .status
            .update_fulfillment_status(order.id, "completed", &staff, None, false)
            .await
            .unwrap()
        {
            FulfillmentOutcome::Updated(order) => order,
            other => panic!("Expected update, got {:?}", other),
        };
        assert_eq!(completed.status, OrderStatus::Delivered);
        assert_eq!(completed.fulfillment_status, FulfillmentStatus::Completed);

        let order_log = h.repository.history(HistoryLog::Order, order.id).await.unwrap();
        let statuses: Vec<&str> = order_log.iter().map(|e| e.new_status.as_str()).collect();
        assert_eq!(statuses, vec!["new", "shipped", "delivered"]);
    }

    #[tokio::test]
    async fn test_shipped_order_fulfillment_cannot_be_cancelled() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;
        h.force(
            order.id,
            json!({"status": "shipped", "fulfillment_status": "shipped"}),
        )
        .await;

        let result = h
            .status
            .update_fulfillment_status(order.id, "cancelled", &actor(Role::Admin), None, false)
            .await;
        match result {
            Err(OrderflowError::BadRequest(reason)) => assert_eq!(
                reason,
                "Fulfillment cannot be cancelled while the order is 'shipped'"
            ),
            other => panic!("Expected BadRequest, got {:?}", other),
        }

        let unchanged = h.repository.get(order.id).await.unwrap();
        assert_eq!(unchanged.status, OrderStatus::Shipped);
        assert_eq!(unchanged.fulfillment_status, FulfillmentStatus::Shipped);
        assert_eq!(unchanged.payment_status, PaymentStatus::Paid);
        assert!(
            h.repository
                .history(HistoryLog::Fulfillment, order.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_ready_fulfillment_cancel_on_shipped_order_is_rejected() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;
        h.force(order.id, json!({"status": "shipped", "fulfillment_status": "ready"}))
            .await;

        let result = h
            .status
            .update_fulfillment_status(order.id, "cancelled", &actor(Role::Staff), None, false)
            .await;
        assert!(matches!(result, Err(OrderflowError::BadRequest(_))));
        assert_eq!(
            h.repository.get(order.id).await.unwrap().payment_status,
            PaymentStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_customer_cannot_move_fulfillment() {
        let h = Harness::new();
        let customer = actor(Role::Customer);
        let order = h.ready_order(&customer).await;

        let result = h
            .status
            .update_fulfillment_status(order.id, "processing", &customer, None, false)
            .await;
        assert!(matches!(result, Err(OrderflowError::Forbidden(_))));
    }
}

// =============================================================================
// Prerequisite gate
// =============================================================================

mod prerequisite_tests {
    use super::*;

    #[tokio::test]
    async fn test_out_of_stock_blocks_processing() {
        let h = Harness::new();
        let customer = actor(Role::Customer);
        let product_id = h.seed_product(0).await;
        let order = h
            .create_order(&customer, product_id, Some(PaymentStatus::Paid), Some(address()))
            .await;

        let outcome = h
            .status
            .update_fulfillment_status(order.id, "processing", &actor(Role::Staff), None, false)
            .await
            .unwrap();

        let report = match outcome {
            FulfillmentOutcome::ValidationFailed(report) => report,
            other => panic!("Expected validation failure, got {:?}", other),
        };
        assert!(!report.is_valid);
        assert!(!report.check(ITEMS_IN_STOCK).unwrap().passed);
        assert_eq!(report.failed_checks(), vec![ITEMS_IN_STOCK.to_string()]);

        let unchanged = h.repository.get(order.id).await.unwrap();
        assert_eq!(unchanged.fulfillment_status, FulfillmentStatus::Pending);
        assert_eq!(unchanged.version, order.version);
        assert!(
            h.repository
                .history(HistoryLog::Fulfillment, order.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_split_lines_share_stock() {
        let h = Harness::new();
        let product_id = h.seed_product(3).await;
        let order = h
            .create_order_with_items(
                &actor(Role::Customer),
                vec![item(product_id, 2), item(product_id, 2)],
                Some(PaymentStatus::Paid),
                Some(address()),
            )
            .await;

        let report = h.status.validate_fulfillment_prerequisites(order.id).await.unwrap();
        assert!(!report.is_valid);
        let stock = report.check(ITEMS_IN_STOCK).unwrap();
        assert!(!stock.passed);
        assert_eq!(
            stock.reason,
            "Insufficient stock: Cloudberry jam (requested 4, in stock 3)"
        );

        let enough = h.seed_product(4).await;
        let order = h
            .create_order_with_items(
                &actor(Role::Customer),
                vec![item(enough, 2), item(enough, 2)],
                Some(PaymentStatus::Paid),
                Some(address()),
            )
            .await;
        let report = h.status.validate_fulfillment_prerequisites(order.id).await.unwrap();
        assert!(report.is_valid);
    }

    #[tokio::test]
    async fn test_override_does_not_cover_new_failures() {
        let h = Harness::new();
        let product_id = h.seed_product(0).await;
        let order = h
            .create_order(
                &actor(Role::Customer),
                product_id,
                Some(PaymentStatus::Paid),
                Some(address()),
            )
            .await;

        h.status
            .override_fulfillment_validation(order.id, &actor(Role::Admin), "stock arriving")
            .await
            .unwrap();
        h.seed_exception(order.id, "damaged_goods").await;

        let outcome = h
            .status
            .update_fulfillment_status(order.id, "processing", &actor(Role::Staff), None, false)
            .await
            .unwrap();
        let report = match outcome {
            FulfillmentOutcome::ValidationFailed(report) => report,
            other => panic!("Expected validation failure, got {:?}", other),
        };
        assert_eq!(
            report.failed_checks(),
            vec![ITEMS_IN_STOCK.to_string(), NO_UNRESOLVED_EXCEPTIONS.to_string()]
        );

        let unchanged = h.repository.get(order.id).await.unwrap();
        assert_eq!(unchanged.fulfillment_status, FulfillmentStatus::Pending);
        assert!(unchanged.validation_override().is_some());
    }

    #[tokio::test]
    async fn test_override_then_admin_skip_succeeds() {
        let h = Harness::new();
        let admin = actor(Role::Admin);
        let product_id = h.seed_product(0).await;
        let order = h
            .create_order(
                &actor(Role::Customer),
                product_id,
                Some(PaymentStatus::Paid),
                Some(address()),
            )
            .await;

        let report = h
            .status
            .override_fulfillment_validation(order.id, &admin, "manual stock correction pending")
            .await
            .unwrap();
        assert!(report.is_valid);
        assert!(!report.check(ITEMS_IN_STOCK).unwrap().passed);
        let info = report.override_info.as_ref().unwrap();
        assert_eq!(info.overridden_by, admin.id);
        assert_eq!(info.reason, "manual stock correction pending");
        assert_eq!(info.failed_checks, vec![ITEMS_IN_STOCK.to_string()]);

        let outcome = h
            .status
            .update_fulfillment_status(order.id, "processing", &admin, None, true)
            .await
            .unwrap();
        assert!(matches!(outcome, FulfillmentOutcome::Updated(ref o) if o.fulfillment_status == FulfillmentStatus::Processing));

        let history = h
            .repository
            .history(HistoryLog::Fulfillment, order.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_status.as_deref(), Some("pending"));
        assert_eq!(history[0].new_status, "processing");

        let notes = h.repository.notes(order.id, true).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].is_internal);
    }

    #[tokio::test]
    async fn test_recorded_override_is_consumed_by_staff() {
        let h = Harness::new();
        let product_id = h.seed_product(0).await;
        let order = h
            .create_order(
                &actor(Role::Customer),
                product_id,
                Some(PaymentStatus::Paid),
                Some(address()),
            )
            .await;

        h.status
            .override_fulfillment_validation(order.id, &actor(Role::Admin), "stock arriving")
            .await
            .unwrap();
        assert!(
            h.repository
                .get(order.id)
                .await
                .unwrap()
                .validation_override()
                .is_some()
        );

        let outcome = h
            .status
            .update_fulfillment_status(order.id, "processing", &actor(Role::Staff), None, false)
            .await
            .unwrap();
        let updated = match outcome {
            FulfillmentOutcome::Updated(order) => order,
            other => panic!("Expected update, got {:?}", other),
        };
        assert!(updated.validation_override().is_none());
    }

    #[tokio::test]
    async fn test_non_admin_cannot_skip_or_override() {
        let h = Harness::new();
        let staff = actor(Role::Staff);
        let order = h.ready_order(&actor(Role::Customer)).await;

        let skip = h
            .status
            .update_fulfillment_status(order.id, "processing", &staff, None, true)
            .await;
        assert!(matches!(skip, Err(OrderflowError::Forbidden(_))));

        let over = h
            .status
            .override_fulfillment_validation(order.id, &staff, "because")
            .await;
        assert!(matches!(over, Err(OrderflowError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_report_lists_every_failure() {
        let h = Harness::new();
        let product_id = h.seed_product(0).await;
        let order = h
            .create_order(&actor(Role::Customer), product_id, None, None)
            .await;
        h.seed_exception(order.id, "damaged_goods").await;

        let report = h.status.validate_fulfillment_prerequisites(order.id).await.unwrap();
        let failed = report.failed_checks();

        assert!(!report.is_valid);
        assert!(failed.contains(&ITEMS_IN_STOCK.to_string()));
        assert!(failed.contains(&PAYMENT_STATUS_COMPATIBLE.to_string()));
        assert_eq!(failed.len(), 4);
        assert_eq!(report.checks.len(), 7);
    }

    #[tokio::test]
    async fn test_validate_does_not_mutate() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;

        let first = h.status.validate_fulfillment_prerequisites(order.id).await.unwrap();
        assert!(first.is_valid);
        assert_eq!(h.repository.get(order.id).await.unwrap().version, order.version);
    }
}

// =============================================================================
// Warehouse documents
// =============================================================================

mod document_tests {
    use super::*;

    #[tokio::test]
    async fn test_pick_list_sums_and_sorts_pickable_lines() {
        let h = Harness::new();
        let staff = actor(Role::Staff);
        let producer = Uuid::new_v4();
        let honey = h.seed_producer_product(producer, "Honey", Some("B-02")).await;
        let jam = h.seed_producer_product(producer, "Jam", Some("A-01")).await;
        let eggs = h.seed_producer_product(producer, "Eggs", None).await;
        let foreign = h.seed_product(10).await;

        let first = h
            .create_order_with_items(
                &actor(Role::Customer),
                vec![item(honey, 2), item(jam, 1), item(foreign, 5)],
                Some(PaymentStatus::Paid),
                Some(address()),
            )
            .await;
        h.force(first.id, json!({"status": "pending"})).await;
        let second = h
            .create_order_with_items(
                &actor(Role::Customer),
                vec![item(honey, 3), item(eggs, 6)],
                Some(PaymentStatus::Paid),
                Some(address()),
            )
            .await;
        h.force(
            second.id,
            json!({"status": "processing", "fulfillment_status": "processing"}),
        )
        .await;
        // not yet confirmed, so not on the list
        h.create_order_with_items(
            &actor(Role::Customer),
            vec![item(honey, 50)],
            Some(PaymentStatus::Paid),
            Some(address()),
        )
        .await;
        // already packed
        let packed = h
            .create_order_with_items(
                &actor(Role::Customer),
                vec![item(jam, 9)],
                Some(PaymentStatus::Paid),
                Some(address()),
            )
            .await;
        h.force(
            packed.id,
            json!({"status": "processing", "fulfillment_status": "packed"}),
        )
        .await;

        let pick_list = assert_ok!(h.documents.producer_pick_list(producer, &staff).await);

        let lines: Vec<(&str, i64, Option<&str>)> = pick_list
            .items
            .iter()
            .map(|line| (line.product_name.as_str(), line.quantity, line.location.as_deref()))
            .collect();
        assert_eq!(
            lines,
            vec![
                ("Jam", 1, Some("A-01")),
                ("Honey", 5, Some("B-02")),
                ("Eggs", 6, None),
            ]
        );
        assert_eq!(pick_list.total_items, 3);
        assert_eq!(pick_list.producer_id, producer);
        assert_eq!(pick_list.items[0].notes.as_deref(), Some("Keep chilled"));
        assert_eq!(pick_list.order_ids.len(), 2);
        assert!(pick_list.order_ids.contains(&first.id));
        assert!(pick_list.order_ids.contains(&second.id));
        assert_eq!(pick_list.notes, None);
    }

    #[tokio::test]
    async fn test_pick_list_explains_empty_results() {
        let h = Harness::new();
        let staff = actor(Role::Staff);

        let unknown = h
            .documents
            .producer_pick_list(Uuid::new_v4(), &staff)
            .await
            .unwrap();
        assert!(unknown.items.is_empty());
        assert_eq!(
            unknown.notes.as_deref(),
            Some("No products found for this producer")
        );

        let producer = Uuid::new_v4();
        h.seed_producer_product(producer, "Honey", None).await;
        let idle = h.documents.producer_pick_list(producer, &staff).await.unwrap();
        assert_eq!(idle.total_items, 0);
        assert_eq!(
            idle.notes.as_deref(),
            Some("No pending orders that need fulfillment")
        );

        let denied = h
            .documents
            .producer_pick_list(producer, &actor(Role::Customer))
            .await;
        assert!(matches!(denied, Err(OrderflowError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_packing_slip_totals_and_pickup_note() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;
        h.force(
            order.id,
            json!({
                "status": "processing",
                "shipping_method_id": "pickup",
                "metadata": {"shipping_cost": "49.00", "pickup_instructions": "Barn door"}
            }),
        )
        .await;

        let slip = assert_ok!(
            h.documents
                .order_packing_slip(order.id, &actor(Role::Staff))
                .await
        );

        assert_eq!(slip.order_id, order.id);
        assert_eq!(slip.customer_id, order.customer_id);
        assert_eq!(slip.total_items, 1);
        assert_eq!(slip.items[0].quantity, 2);
        assert_eq!(slip.subtotal, Decimal::new(13900, 2));
        assert_eq!(slip.shipping_cost, Decimal::new(4900, 2));
        assert_eq!(slip.total_amount, Decimal::new(18800, 2));
        assert_eq!(slip.currency, "SEK");
        assert!(slip.notes.ends_with("For local pickup, please bring a valid ID."));
        assert_eq!(slip.pickup_instructions.as_deref(), Some("Barn door"));
    }

    #[tokio::test]
    async fn test_packing_slip_rejects_unconfirmed_order() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;

        let result = h
            .documents
            .order_packing_slip(order.id, &actor(Role::Staff))
            .await;
        match result {
            Err(OrderflowError::BadRequest(reason)) => assert_eq!(
                reason,
                "Cannot generate packing slip for order with status 'new'. \
                 Order must be in one of these statuses: pending, processing, shipped"
            ),
            other => panic!("Expected BadRequest, got {:?}", other),
        }

        let missing = h
            .documents
            .order_packing_slip(Uuid::new_v4(), &actor(Role::Staff))
            .await;
        assert!(matches!(missing, Err(OrderflowError::NotFound { .. })));
    }
}

// =============================================================================
// Timelines
// =============================================================================

mod timeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_timeline_is_ordered_and_idempotent() {
        let h = Harness::new();
        let customer = actor(Role::Customer);
        let order = h.ready_order(&customer).await;
        h.status
            .transition_order_status(order.id, "pending", &customer, None)
            .await
            .unwrap();
        h.status
            .transition_order_status(order.id, "processing", &actor(Role::Staff), None)
            .await
            .unwrap();

        let first = h.timeline.get_status_timeline(order.id).await.unwrap();
        let second = h.timeline.get_status_timeline(order.id).await.unwrap();

        assert_eq!(first, second);
        let statuses: Vec<&str> = first.iter().map(|e| e.status.as_str()).collect();
        assert_eq!(statuses, vec!["new", "pending", "processing"]);
        assert_eq!(first[2].description, OrderStatus::Processing.description());
    }

    #[tokio::test]
    async fn test_fulfillment_history_empty_until_moved() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;

        assert!(h.timeline.get_fulfillment_history(order.id).await.unwrap().is_empty());

        let missing = h.timeline.get_fulfillment_history(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(OrderflowError::NotFound { .. })));
    }
}

// =============================================================================
// Concurrency
// =============================================================================

mod conflict_tests {
    use super::*;

    #[tokio::test]
    async fn test_stale_version_is_conflict() {
        let h = Harness::new();
        let customer = actor(Role::Customer);
        let order = h.ready_order(&customer).await;

        h.status
            .transition_order_status(order.id, "pending", &customer, None)
            .await
            .unwrap();

        let mut patch = Record::new();
        patch.insert("status".to_string(), json!("cancelled"));
        let stale = h.repository.update_guarded(order.id, order.version, patch).await;

        assert!(matches!(stale, Err(OrderflowError::Conflict { id }) if id == order.id));
        assert_eq!(
            h.repository.get(order.id).await.unwrap().status,
            OrderStatus::Pending
        );
    }
}

// =============================================================================
// Post-commit effects
// =============================================================================

/// Store whose history inserts can be switched to fail
#[derive(Clone, Default)]
struct FlakyHistoryStore {
    inner: InMemoryStore,
    fail_history: Arc<AtomicBool>,
}

#[async_trait]
impl Store for FlakyHistoryStore {
    async fn fetch_one(&self, table: &str, filter: &Filter) -> anyhow::Result<Option<Record>> {
        self.inner.fetch_one(table, filter).await
    }

    async fn fetch_all(
        &self,
        table: &str,
        filter: &Filter,
        options: &FetchOptions,
    ) -> anyhow::Result<Vec<Record>> {
        self.inner.fetch_all(table, filter, options).await
    }

    async fn insert(&self, table: &str, record: Record) -> anyhow::Result<Record> {
        let history = table == ORDER_HISTORY || table == FULFILLMENT_HISTORY;
        if history && self.fail_history.load(Ordering::SeqCst) {
            anyhow::bail!("history table unavailable");
        }
        self.inner.insert(table, record).await
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: Record,
    ) -> anyhow::Result<Option<Record>> {
        self.inner.update(table, filter, patch).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> anyhow::Result<bool> {
        self.inner.delete(table, filter).await
    }
}

#[derive(Default)]
struct Recorder {
    delivered: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify_status_update(
        &self,
        _order_id: Uuid,
        _recipient_id: Uuid,
        new_status: &str,
        _message: &str,
    ) -> anyhow::Result<()> {
        self.delivered.lock().unwrap().push(format!("status:{}", new_status));
        if self.fail {
            anyhow::bail!("transport down");
        }
        Ok(())
    }

    async fn notify_fulfillment_request(
        &self,
        _order_id: Uuid,
        _recipient_id: Uuid,
        reference_id: &str,
    ) -> anyhow::Result<()> {
        self.delivered
            .lock()
            .unwrap()
            .push(format!("fulfillment:{}", &reference_id[..4]));
        Ok(())
    }

    async fn notify_order_completion(&self, _order_id: Uuid, _recipient_id: Uuid) -> anyhow::Result<()> {
        self.delivered.lock().unwrap().push("completed".to_string());
        Ok(())
    }
}

async fn wait_for(recorder: &Recorder, count: usize) -> Vec<String> {
    for _ in 0..100 {
        {
            let delivered = recorder.delivered.lock().unwrap();
            if delivered.len() >= count {
                return delivered.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    recorder.delivered.lock().unwrap().clone()
}

mod post_commit_tests {
    use super::*;

    #[tokio::test]
    async fn test_history_failure_does_not_undo_change() {
        let store = FlakyHistoryStore::default();
        let h = Harness::with_store(Arc::new(store.clone()));
        let customer = actor(Role::Customer);
        let order = h.ready_order(&customer).await;

        store.fail_history.store(true, Ordering::SeqCst);
        let updated = assert_ok!(
            h.status
                .transition_order_status(order.id, "pending", &customer, None)
                .await
        );
        assert_eq!(updated.status, OrderStatus::Pending);

        store.fail_history.store(false, Ordering::SeqCst);
        assert_eq!(
            h.repository.get(order.id).await.unwrap().status,
            OrderStatus::Pending
        );
        let history = h.repository.history(HistoryLog::Order, order.id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_events_published_after_commit() {
        let h = Harness::new();
        let customer = actor(Role::Customer);
        let order = h.ready_order(&customer).await;
        let mut rx = h.events.subscribe();

        h.status
            .transition_order_status(order.id, "pending", &customer, None)
            .await
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        match envelope.event {
            OrderEvent::StatusChanged {
                order_id,
                dimension,
                previous,
                new,
                recipient_id,
                ..
            } => {
                assert_eq!(order_id, order.id);
                assert_eq!(dimension, StatusDimension::Order);
                assert_eq!(previous, "new");
                assert_eq!(new, "pending");
                assert_eq!(recipient_id, Some(customer.id));
            }
            other => panic!("Expected StatusChanged, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rejected_transition_publishes_nothing() {
        let h = Harness::new();
        let order = h.ready_order(&actor(Role::Customer)).await;
        let mut rx = h.events.subscribe();

        assert_err!(
            h.status
                .transition_order_status(order.id, "shipped", &actor(Role::Admin), None)
                .await
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_fulfillment_request() {
        let h = Harness::new();
        let recorder = Arc::new(Recorder::default());
        NotificationDispatcher::new(recorder.clone()).spawn(&h.events);
        let order = h.ready_order(&actor(Role::Customer)).await;

        h.status
            .update_fulfillment_status(order.id, "processing", &actor(Role::Staff), None, false)
            .await
            .unwrap();

        let delivered = wait_for(&recorder, 2).await;
        assert_eq!(delivered, vec!["status:processing", "fulfillment:FUL-"]);
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_fail_transition() {
        let h = Harness::new();
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        NotificationDispatcher::new(recorder.clone()).spawn(&h.events);
        let customer = actor(Role::Customer);
        let order = h.ready_order(&customer).await;

        let first = h
            .status
            .transition_order_status(order.id, "pending", &customer, None)
            .await;
        assert_ok!(first);
        let second = h
            .status
            .transition_order_status(order.id, "cancelled", &customer, None)
            .await;
        assert_ok!(second);

        let delivered = wait_for(&recorder, 4).await;
        assert_eq!(
            delivered,
            vec![
                "status:pending",
                "status:cancelled",
                "status:cancelled",
                "status:refunded"
            ]
        );
    }
}
