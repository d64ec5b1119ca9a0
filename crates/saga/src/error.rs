//! Saga error types.

use common::{AggregateId, ErrorKind};
use domain::{DomainError, OrderError, OrderStatus, PaymentStatus, ProductId};
use event_store::EventStoreError;
use thiserror::Error;

use crate::compensation::CompensationReport;

/// Errors raised by the stock ledger, the collaborator ports and the
/// orchestrator.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Order not found: {0}")]
    OrderNotFound(AggregateId),

    #[error("Saga not found: {0}")]
    SagaNotFound(AggregateId),

    #[error("Cart for user {0} is empty")]
    EmptyCart(domain::UserId),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Placement aborted. `source` is the step error that triggered the abort;
    /// `compensation` records what the rollback managed to undo.
    #[error("Order placement failed: {source}")]
    OrderPlacementFailed {
        source: Box<SagaError>,
        compensation: CompensationReport,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    #[error("Payment already processed (status {status})")]
    PaymentAlreadyProcessed { status: PaymentStatus },

    #[error("Invalid payment status: {0}")]
    InvalidPaymentStatus(String),

    #[error("No reservation for order {order_id}, product {product_id}")]
    ReservationNotFound {
        order_id: AggregateId,
        product_id: ProductId,
    },

    #[error("Reservation for order {order_id}, product {product_id} is already {state}")]
    ReservationSettled {
        order_id: AggregateId,
        product_id: ProductId,
        state: &'static str,
    },

    #[error("Reservation for product {product_id} holds {reserved}, not {requested}")]
    QuantityMismatch {
        product_id: ProductId,
        reserved: u32,
        requested: u32,
    },

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Stock for product {product_id} cannot drop to {total} while {reserved} are reserved")]
    StockBelowReserved {
        product_id: ProductId,
        total: u32,
        reserved: u32,
    },

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// A downstream call did not answer within the call timeout.
    #[error("Timed out waiting for {operation}")]
    Timeout { operation: &'static str },

    /// A collaborator service failed.
    #[error("{service} service error: {message}")]
    Downstream {
        service: &'static str,
        message: String,
    },

    /// The stock ledger itself failed (not a business rejection).
    #[error("Stock ledger error: {0}")]
    Ledger(String),

    #[error("Domain error: {0}")]
    Domain(DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Client-facing category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::OrderNotFound(_)
            | SagaError::SagaNotFound(_)
            | SagaError::ReservationNotFound { .. }
            | SagaError::ProductNotFound(_) => ErrorKind::NotFound,

            SagaError::EmptyCart(_)
            | SagaError::InsufficientStock { .. }
            | SagaError::InvalidPaymentStatus(_)
            | SagaError::InvalidQuantity { .. } => ErrorKind::Validation,

            SagaError::InvalidStateTransition { .. }
            | SagaError::PaymentAlreadyProcessed { .. }
            | SagaError::ReservationSettled { .. }
            | SagaError::QuantityMismatch { .. }
            | SagaError::StockBelowReserved { .. } => ErrorKind::Conflict,

            SagaError::OrderPlacementFailed { source, .. } => source.kind(),

            SagaError::Domain(e) if e.is_concurrency_conflict() => ErrorKind::Conflict,
            SagaError::Domain(DomainError::Order(_) | DomainError::Payment(_)) => {
                ErrorKind::Validation
            }

            SagaError::Timeout { .. }
            | SagaError::Downstream { .. }
            | SagaError::Ledger(_)
            | SagaError::Domain(_)
            | SagaError::EventStore(_)
            | SagaError::Serialization(_) => ErrorKind::ServerFault,
        }
    }

    /// Outcome of the ledger call is unknown, so the reservation may exist.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            SagaError::Timeout { .. } | SagaError::Ledger(_) | SagaError::Downstream { .. }
        )
    }

    /// The triggering error of a failed placement, or `self`.
    pub fn root_cause(&self) -> &SagaError {
        match self {
            SagaError::OrderPlacementFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<DomainError> for SagaError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Order(OrderError::InvalidStateTransition { from, to }) => {
                SagaError::InvalidStateTransition { from, to }
            }
            DomainError::Order(OrderError::PaymentAlreadyProcessed { status }) => {
                SagaError::PaymentAlreadyProcessed { status }
            }
            other => SagaError::Domain(other),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
