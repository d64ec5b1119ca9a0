//! Domain layer for order placement.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler for load / decide / append with optimistic concurrency
//! - The Order aggregate with its order-status and payment-status machines
//! - The Payment aggregate recording one verified payment per order

pub mod aggregate;
pub mod command;
pub mod error;
pub mod order;
pub mod payment;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    Money, MoneyParseError, Order, OrderError, OrderEvent, OrderItem, OrderStatus, OrderStore,
    PaymentStatus, ProductId, UserId, quantities_by_product,
};
pub use payment::{Payment, PaymentError, PaymentEvent, PaymentState, PaymentStore};
