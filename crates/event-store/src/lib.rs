//! Append-only event log with optimistic concurrency.
//!
//! Orders, payment records and placement-saga step logs are all persisted
//! here as ordered per-aggregate event streams. Two backends share the
//! [`EventStore`] trait: an in-memory store for tests and single-node runs,
//! and a PostgreSQL store for durable deployments.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt};
