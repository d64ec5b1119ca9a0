//! Order placement, lookup and transition endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{OrderStatus, PaymentStatus};
use event_store::EventStore;
use saga::{OrderView, SagaError, SagaInstance};
use serde::Deserialize;

use super::{parse_aggregate_id, parse_user_id};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    pub payment_status: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub order_status: String,
}

/// POST /api/orders/place/{user_id}: turns the user's cart into an order.
#[tracing::instrument(skip(state))]
pub async fn place<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, ApiResponse<OrderView>), ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let order = state.orchestrator.place_order(user_id).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Order placed successfully", order),
    ))
}

/// GET /api/orders/{order_id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<ApiResponse<OrderView>, ApiError> {
    let order_id = parse_aggregate_id(&order_id)?;
    let order = state.orchestrator.get_order(order_id).await?;
    Ok(ApiResponse::ok("Order fetched successfully", order))
}

/// GET /api/orders/user/{user_id}
#[tracing::instrument(skip(state))]
pub async fn list_for_user<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<Vec<OrderView>>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let orders = state.orchestrator.orders_for_user(user_id).await?;
    Ok(ApiResponse::ok("Orders fetched successfully", orders))
}

/// PUT /api/orders/cancel/{order_id}
#[tracing::instrument(skip(state))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<ApiResponse<OrderView>, ApiError> {
    let order_id = parse_aggregate_id(&order_id)?;
    let order = state.orchestrator.cancel_order(order_id).await?;
    Ok(ApiResponse::ok("Order cancelled successfully", order))
}

/// PUT /api/orders/{order_id}/payment-status
#[tracing::instrument(skip(state, body))]
pub async fn update_payment_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
    body: Result<Json<PaymentStatusRequest>, JsonRejection>,
) -> Result<ApiResponse<OrderView>, ApiError> {
    let order_id = parse_aggregate_id(&order_id)?;
    let Json(request) = body?;
    let status: PaymentStatus = request
        .payment_status
        .parse()
        .map_err(|_| SagaError::InvalidPaymentStatus(request.payment_status.clone()))?;

    let order = state
        .orchestrator
        .update_payment_status(order_id, status)
        .await?;
    Ok(ApiResponse::ok("Payment status updated successfully", order))
}

/// PUT /api/orders/{order_id}/status: fulfilment transitions.
#[tracing::instrument(skip(state, body))]
pub async fn update_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
    body: Result<Json<OrderStatusRequest>, JsonRejection>,
) -> Result<ApiResponse<OrderView>, ApiError> {
    let order_id = parse_aggregate_id(&order_id)?;
    let Json(request) = body?;
    let status: OrderStatus = request
        .order_status
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let order = state
        .orchestrator
        .update_order_status(order_id, status)
        .await?;
    Ok(ApiResponse::ok("Order status updated successfully", order))
}

/// GET /api/orders/sagas/{saga_id}: the placement step log, folded.
#[tracing::instrument(skip(state))]
pub async fn saga<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(saga_id): Path<String>,
) -> Result<ApiResponse<SagaInstance>, ApiError> {
    let saga_id = parse_aggregate_id(&saga_id)?;
    let saga = state.orchestrator.get_saga(saga_id).await?;
    Ok(ApiResponse::ok("Saga fetched successfully", saga))
}
