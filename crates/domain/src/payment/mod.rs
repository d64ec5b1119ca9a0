//! Payment aggregate: the local record of one provider payment per order.

mod aggregate;
mod events;
mod store;

pub use aggregate::{Payment, PaymentState};
pub use events::{
    PaymentCreatedData, PaymentDeclinedData, PaymentEvent, PaymentOrderSyncedData,
    PaymentSucceededData,
};
pub use store::PaymentStore;

use thiserror::Error;

/// Errors that can occur during payment record operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No payment has been created under this ID.
    #[error("Payment has not been created")]
    NotCreated,

    /// A payment already exists under this ID.
    #[error("Payment already created")]
    AlreadyCreated,

    /// The payment already reached PAID or FAILED.
    #[error("Payment already {state}")]
    AlreadyTerminal { state: PaymentState },

    /// The order can only be synced once the payment is terminal.
    #[error("Payment is still {state}")]
    NotTerminal { state: PaymentState },
}
