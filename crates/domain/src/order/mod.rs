//! Order aggregate and related types.

mod aggregate;
mod events;
mod state;
mod store;
mod value_objects;

pub use aggregate::Order;
pub use events::{
    OrderCancelledData, OrderDeliveredData, OrderEvent, OrderPlacedData, OrderShippedData,
    PaymentConfirmedData, PaymentFailedData,
};
pub use state::{OrderStatus, PaymentStatus, UnknownStatus};
pub use store::OrderStore;
pub use value_objects::{
    Money, MoneyParseError, OrderItem, ProductId, UserId, quantities_by_product,
};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order has no `OrderPlaced` event.
    #[error("Order has not been placed")]
    NotPlaced,

    /// An order with this ID already exists.
    #[error("Order already placed")]
    AlreadyPlaced,

    /// The requested status change is not an edge of the state machine.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    /// The payment sub-state has already left PENDING.
    #[error("Payment already processed (status {status})")]
    PaymentAlreadyProcessed { status: PaymentStatus },

    /// Invalid quantity.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Invalid price.
    #[error("Invalid price {price} for product {product_id} (must be greater than 0)")]
    InvalidPrice { product_id: ProductId, price: i64 },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Quantities for one product add up past `u32::MAX`.
    #[error("Total quantity for product {product_id} is too large")]
    QuantityOverflow { product_id: ProductId },

    /// A line total or the order total does not fit in `i64` minor units.
    #[error("Order amount is too large")]
    AmountOverflow,
}
