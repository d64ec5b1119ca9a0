//! Ports to the services the placement saga talks to, with in-memory doubles.

pub mod cart;
pub mod catalog;
pub mod stock;

pub use cart::{CartLine, CartProvider, CartSnapshot, InMemoryCartProvider};
pub use catalog::{InMemoryProductCatalog, ProductCatalog};
pub use stock::{
    InMemoryStockLedger, LedgerCall, LedgerOp, LedgerOutcome, ReservationEntry, ReservationKey,
    StockLedger, StockLevel,
};
