//! Service-to-service endpoints: stock ledger, cart seeding and recovery.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use domain::Money;
use event_store::EventStore;
use saga::{CartLine, LedgerOutcome, RecoveryReport, ReservationKey, StockLedger, StockLevel};
use serde::{Deserialize, Serialize};

use super::{parse_aggregate_id, parse_product_id, parse_user_id};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub order_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct CartRequest {
    pub items: Vec<CartItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub product_id: i64,
    pub product_name: Option<String>,
    pub quantity: u32,
    pub unit_price: String,
}

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub outcome: LedgerOutcome,
    pub stock: StockLevel,
}

#[derive(Debug, Clone, Copy)]
enum LedgerAction {
    Reserve,
    Confirm,
    Release,
}

/// PUT /internal/products/{product_id}: registers a product or updates its
/// total stock. Pending reservations are kept.
#[tracing::instrument(skip(state, body))]
pub async fn upsert_product<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<ApiResponse<StockLevel>, ApiError> {
    let product_id = parse_product_id(&product_id)?;
    let Json(request) = body?;

    let stock = state.ledger.set_stock(product_id, request.stock).await?;
    if let Some(name) = request.name {
        state.catalog.insert(product_id, name).await;
    }
    Ok(ApiResponse::ok("Product stock set", stock))
}

/// GET /internal/products/{product_id}/stock
#[tracing::instrument(skip(state))]
pub async fn stock<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
) -> Result<ApiResponse<StockLevel>, ApiError> {
    let product_id = parse_product_id(&product_id)?;
    let stock = state.ledger.stock_level(product_id).await?;
    Ok(ApiResponse::ok("Stock fetched successfully", stock))
}

/// POST /internal/products/{product_id}/{reserve|confirm|release}?order_id=&quantity=
#[tracing::instrument(skip(state, query))]
async fn ledger_call<S: EventStore + Clone + 'static>(
    action: LedgerAction,
    state: Arc<AppState<S>>,
    product_id: String,
    query: Result<Query<LedgerQuery>, QueryRejection>,
) -> Result<ApiResponse<LedgerResponse>, ApiError> {
    let product_id = parse_product_id(&product_id)?;
    let Query(query) = query?;
    let key = ReservationKey::new(parse_aggregate_id(&query.order_id)?, product_id);

    let (outcome, message) = match action {
        LedgerAction::Reserve => (
            state.ledger.reserve(key, query.quantity).await?,
            "Stock reserved",
        ),
        LedgerAction::Confirm => (
            state.ledger.confirm(key, query.quantity).await?,
            "Reservation confirmed",
        ),
        LedgerAction::Release => (
            state.ledger.release(key, query.quantity).await?,
            "Reservation released",
        ),
    };
    let stock = state.ledger.stock_level(product_id).await?;
    Ok(ApiResponse::ok(message, LedgerResponse { outcome, stock }))
}

pub async fn reserve<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
    query: Result<Query<LedgerQuery>, QueryRejection>,
) -> Result<ApiResponse<LedgerResponse>, ApiError> {
    ledger_call(LedgerAction::Reserve, state, product_id, query).await
}

pub async fn confirm<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
    query: Result<Query<LedgerQuery>, QueryRejection>,
) -> Result<ApiResponse<LedgerResponse>, ApiError> {
    ledger_call(LedgerAction::Confirm, state, product_id, query).await
}

pub async fn release<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
    query: Result<Query<LedgerQuery>, QueryRejection>,
) -> Result<ApiResponse<LedgerResponse>, ApiError> {
    ledger_call(LedgerAction::Release, state, product_id, query).await
}

/// PUT /internal/carts/{user_id}: replaces a user's cart.
#[tracing::instrument(skip(state, body))]
pub async fn set_cart<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    body: Result<Json<CartRequest>, JsonRejection>,
) -> Result<ApiResponse<usize>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let Json(request) = body?;

    let mut lines = Vec::with_capacity(request.items.len());
    for item in request.items {
        let unit_price: Money = item
            .unit_price
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
        let mut line = CartLine::new(item.product_id, item.quantity, unit_price);
        line.product_name = item.product_name;
        lines.push(line);
    }

    let count = lines.len();
    state.carts.set_cart(user_id, lines).await;
    Ok(ApiResponse::ok("Cart updated", count))
}

/// POST /internal/reconcile: runs the recovery sweep now.
#[tracing::instrument(skip(state))]
pub async fn reconcile<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<ApiResponse<RecoveryReport>, ApiError> {
    let report = state.orchestrator.recover_incomplete().await?;
    Ok(ApiResponse::ok("Recovery sweep finished", report))
}
