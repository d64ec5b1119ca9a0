//! Payment verifier error types.

use common::{AggregateId, ErrorKind};
use domain::{DomainError, OrderStatus, PaymentError, PaymentState};
use saga::SagaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("Payment record not found for order {0}")]
    PaymentNotFound(AggregateId),

    #[error("Payment signature verification failed")]
    SignatureMismatch,

    #[error("Order not found: {0}")]
    OrderNotFound(AggregateId),

    #[error("Invalid payment request: {0}")]
    Validation(String),

    #[error("Payment already {state}")]
    AlreadyProcessed { state: PaymentState },

    /// The order was closed before the payment settled; the payment is declined.
    #[error("Order is {status} and can no longer take payment")]
    OrderClosed { status: OrderStatus },

    /// The payment provider rejected or did not answer the call.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// The order side rejected or failed the payment outcome.
    #[error("Order update failed: {0}")]
    Order(SagaError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl VerifierError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerifierError::PaymentNotFound(_) | VerifierError::OrderNotFound(_) => {
                ErrorKind::NotFound
            }
            VerifierError::SignatureMismatch | VerifierError::Validation(_) => {
                ErrorKind::Validation
            }
            VerifierError::AlreadyProcessed { .. } | VerifierError::OrderClosed { .. } => {
                ErrorKind::Conflict
            }
            VerifierError::Order(e) => e.kind(),
            VerifierError::Domain(e) if e.is_concurrency_conflict() => ErrorKind::Conflict,
            VerifierError::Domain(DomainError::Payment(PaymentError::AlreadyTerminal { .. })) => {
                ErrorKind::Conflict
            }
            VerifierError::Gateway(_) | VerifierError::Domain(_) => ErrorKind::ServerFault,
        }
    }
}

impl From<SagaError> for VerifierError {
    fn from(err: SagaError) -> Self {
        match err {
            SagaError::OrderNotFound(order_id) => VerifierError::OrderNotFound(order_id),
            other => VerifierError::Order(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifierError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::PaymentStatus;

    #[test]
    fn order_errors_keep_their_category() {
        let err: VerifierError = SagaError::OrderNotFound(AggregateId::new()).into();
        assert!(matches!(err, VerifierError::OrderNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: VerifierError = SagaError::InvalidStateTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Confirmed,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: VerifierError = SagaError::PaymentAlreadyProcessed {
            status: PaymentStatus::Paid,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_categories() {
        assert_eq!(VerifierError::SignatureMismatch.kind(), ErrorKind::Validation);
        assert_eq!(
            VerifierError::AlreadyProcessed {
                state: PaymentState::Paid
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            VerifierError::OrderClosed {
                status: OrderStatus::Cancelled
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            VerifierError::Gateway("down".into()).kind(),
            ErrorKind::ServerFault
        );
    }
}
