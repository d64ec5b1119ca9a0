//! Payment intent and provider callback endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use domain::{Money, UserId};
use event_store::EventStore;
use payment::{PaymentIntent, VerificationResult, VerifyPayment};
use serde::Deserialize;

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub user_id: i64,
    /// Decimal string, e.g. `"120.00"`.
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub provider_order_id: String,
    pub provider_payment_id: String,
    pub signature: String,
}

/// POST /api/payment/create
#[tracing::instrument(skip(state, body))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<PaymentIntent>), ApiError> {
    let Json(request) = body?;
    let order_id = parse_aggregate_id(&request.order_id)?;
    let amount: Money = request
        .amount
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let intent = state
        .verifier
        .create_payment_intent(order_id, UserId::new(request.user_id), amount)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Payment order created", intent),
    ))
}

/// POST /api/payment/verify
#[tracing::instrument(skip(state, body))]
pub async fn verify<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<ApiResponse<VerificationResult>, ApiError> {
    let Json(request) = body?;
    let order_id = parse_aggregate_id(&request.order_id)?;

    let result = state
        .verifier
        .verify_payment(VerifyPayment {
            order_id,
            provider_order_ref: request.provider_order_id,
            provider_payment_ref: request.provider_payment_id,
            signature: request.signature,
        })
        .await?;

    let message = if result.replayed {
        "Payment already verified"
    } else {
        "Payment verified successfully"
    };
    Ok(ApiResponse::ok(message, result))
}
