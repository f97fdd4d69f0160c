//! Route table

use super::handlers::{
    add_note, cancel_order, create_order, delete_order, fulfillment_history,
    fulfillment_transitions, get_order, health_check, order_packing_slip, order_timeline,
    order_transitions, override_validation, producer_pick_list, update_fulfillment_status,
    update_order_status, validate_fulfillment,
};
use super::state::AppState;
use axum::Router;
use axum::routing::{get, patch, post};

/// Build every route of the service
///
/// - GET /health, /healthz
/// - POST /orders, GET|DELETE /orders/{id}, POST /orders/{id}/notes
/// - PATCH /orders/{id}/status, PATCH /orders/{id}/cancel
/// - GET /orders/{id}/status/transitions, GET /orders/{id}/timeline
/// - PATCH /fulfillment/orders/{id}/status?skip_validation=bool
/// - GET /fulfillment/orders/{id}/status/transitions, GET /fulfillment/orders/{id}/history
/// - GET /fulfillment/orders/{id}/validate, POST /fulfillment/orders/{id}/validate/override
/// - GET /fulfillment/producers/{id}/pick-list, GET /fulfillment/orders/{id}/packing-slip
pub fn build_routes(state: AppState) -> Router {
    let orders = Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", get(get_order).delete(delete_order))
        .route("/orders/{id}/notes", post(add_note))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/orders/{id}/cancel", patch(cancel_order))
        .route("/orders/{id}/status/transitions", get(order_transitions))
        .route("/orders/{id}/timeline", get(order_timeline));

    let fulfillment = Router::new()
        .route(
            "/fulfillment/orders/{id}/status",
            patch(update_fulfillment_status),
        )
        .route(
            "/fulfillment/orders/{id}/status/transitions",
            get(fulfillment_transitions),
        )
        .route("/fulfillment/orders/{id}/history", get(fulfillment_history))
        .route("/fulfillment/orders/{id}/validate", get(validate_fulfillment))
        .route(
            "/fulfillment/orders/{id}/validate/override",
            post(override_validation),
        )
        .route(
            "/fulfillment/orders/{id}/packing-slip",
            get(order_packing_slip),
        )
        .route(
            "/fulfillment/producers/{id}/pick-list",
            get(producer_pick_list),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .merge(orders)
        .merge(fulfillment)
        .with_state(state)
}
