//! HTTP handlers for orders and fulfillment
//!
//! Handlers only translate between HTTP and the services. Every decision
//! about who may do what lives in the services.

use super::extractors::CurrentActor;
use super::state::AppState;
use crate::core::auth::Role;
use crate::core::error::{OrderflowError, OrderflowResult};
use crate::fulfillment::{
    FulfillmentOutcome, PackingSlip, PickList, TimelineEntry, TransitionOptions, ValidationReport,
};
use crate::orders::{NewOrder, Order, OrderDetails, OrderNote};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Request body for either status dimension
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FulfillmentQuery {
    #[serde(default)]
    pub skip_validation: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub override_reason: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub content: String,
    #[serde(default)]
    pub is_internal: bool,
}

/// Response for the timeline endpoints
#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    pub order_id: Uuid,
    pub entries: Vec<TimelineEntry>,
    pub count: usize,
}

impl TimelineResponse {
    fn new(order_id: Uuid, entries: Vec<TimelineEntry>) -> Self {
        Self {
            order_id,
            count: entries.len(),
            entries,
        }
    }
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "orderflow"
    }))
}

pub async fn create_order(
    State(state): State<AppState>,
    actor: CurrentActor,
    Json(body): Json<NewOrder>,
) -> OrderflowResult<(StatusCode, Json<OrderDetails>)> {
    let details = state.orders.create_order(&actor, body).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn get_order(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> OrderflowResult<Json<OrderDetails>> {
    let details = state.orders.get_order_details(order_id, &actor).await?;
    Ok(Json(details))
}

pub async fn delete_order(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> OrderflowResult<StatusCode> {
    state.orders.delete_order(order_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_note(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
    Json(body): Json<NoteRequest>,
) -> OrderflowResult<(StatusCode, Json<OrderNote>)> {
    let note = state
        .orders
        .add_note(order_id, &actor, &body.content, body.is_internal)
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
    Json(body): Json<StatusUpdateRequest>,
) -> OrderflowResult<Json<Order>> {
    let order = state
        .status
        .transition_order_status(order_id, &body.status, &actor, body.notes)
        .await?;
    Ok(Json(order))
}

/// The body is optional; an empty request cancels without a reason
pub async fn cancel_order(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
    body: Bytes,
) -> OrderflowResult<Json<Order>> {
    let reason = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<CancelRequest>(&body)
            .map_err(|e| OrderflowError::BadRequest(format!("Invalid request: {}", e)))?
            .reason
    };
    let order = state.status.cancel_order(order_id, &actor, reason).await?;
    Ok(Json(order))
}

pub async fn order_transitions(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> OrderflowResult<Json<TransitionOptions>> {
    Ok(Json(state.status.order_transitions(order_id, &actor).await?))
}

pub async fn order_timeline(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> OrderflowResult<Json<TimelineResponse>> {
    state.status.readable_order(order_id, &actor).await?;
    let entries = state.timeline.get_status_timeline(order_id).await?;
    Ok(Json(TimelineResponse::new(order_id, entries)))
}

/// A failed prerequisite report is returned as a 400 carrying the report
pub async fn update_fulfillment_status(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
    Query(query): Query<FulfillmentQuery>,
    Json(body): Json<StatusUpdateRequest>,
) -> OrderflowResult<Json<Order>> {
    let outcome = state
        .status
        .update_fulfillment_status(
            order_id,
            &body.status,
            &actor,
            body.notes,
            query.skip_validation,
        )
        .await?;

    match outcome {
        FulfillmentOutcome::Updated(order) => Ok(Json(order)),
        FulfillmentOutcome::ValidationFailed(report) => {
            Err(OrderflowError::ValidationFailed(Box::new(report)))
        }
    }
}

pub async fn fulfillment_transitions(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> OrderflowResult<Json<TransitionOptions>> {
    Ok(Json(
        state.status.fulfillment_transitions(order_id, &actor).await?,
    ))
}

pub async fn fulfillment_history(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> OrderflowResult<Json<TimelineResponse>> {
    state.status.readable_order(order_id, &actor).await?;
    let entries = state.timeline.get_fulfillment_history(order_id).await?;
    Ok(Json(TimelineResponse::new(order_id, entries)))
}

pub async fn validate_fulfillment(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> OrderflowResult<Json<ValidationReport>> {
    if !actor.role.at_least(Role::Staff) {
        return Err(OrderflowError::Forbidden(
            "Only staff can inspect fulfillment prerequisites".to_string(),
        ));
    }
    let report = state
        .status
        .validate_fulfillment_prerequisites(order_id)
        .await?;
    Ok(Json(report))
}

pub async fn override_validation(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
    Json(body): Json<OverrideRequest>,
) -> OrderflowResult<Json<ValidationReport>> {
    let report = state
        .status
        .override_fulfillment_validation(order_id, &actor, &body.override_reason)
        .await?;
    Ok(Json(report))
}

pub async fn producer_pick_list(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(producer_id): Path<Uuid>,
) -> OrderflowResult<Json<PickList>> {
    Ok(Json(
        state.documents.producer_pick_list(producer_id, &actor).await?,
    ))
}

pub async fn order_packing_slip(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(order_id): Path<Uuid>,
) -> OrderflowResult<Json<PackingSlip>> {
    Ok(Json(
        state.documents.order_packing_slip(order_id, &actor).await?,
    ))
}
