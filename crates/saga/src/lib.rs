//! Order placement saga.
//!
//! Placing an order reserves stock for every cart line, persists the order
//! and clears the cart, without a transaction spanning those resources:
//! 1. Reserve stock (all lines concurrently)
//! 2. Create the order record
//! 3. Clear the cart
//!
//! The saga is event-sourced, so a failure compensates what was done and a
//! crash is picked up by the recovery sweep. Stock reserved for an order is
//! later confirmed or released when its payment settles.

pub mod aggregate;
pub mod compensation;
pub mod error;
pub mod events;
pub mod locks;
pub mod orchestrator;
pub mod placement;
pub mod retry;
mod saga_log;
pub mod services;
pub mod state;
pub mod view;

pub use aggregate::{ItemProgress, SagaInstance, SagaItem};
pub use compensation::{CompensationReport, ReleaseFailure};
pub use error::{Result, SagaError};
pub use events::{RequestedItem, SagaEvent};
pub use locks::KeyedLocks;
pub use orchestrator::{OrchestratorConfig, OrderOrchestrator, RecoveryReport};
pub use retry::{RetryPolicy, with_timeout};
pub use services::{
    CartLine, CartProvider, CartSnapshot, InMemoryCartProvider, InMemoryProductCatalog,
    InMemoryStockLedger, LedgerCall, LedgerOp, LedgerOutcome, ProductCatalog, ReservationEntry,
    ReservationKey, StockLedger, StockLevel,
};
pub use state::SagaState;
pub use view::{OrderItemView, OrderView};
