//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact that happened to an aggregate, named in the past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Event name stored alongside the payload and used for lookups by type.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced consistency boundary.
///
/// Aggregates are rebuilt by replaying their events. Commands are plain
/// methods that inspect the current state and return the events to record;
/// `apply` folds one event into the state and must never fail.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Aggregate name used to group streams in the event store.
    fn aggregate_type() -> &'static str;

    /// Returns None until the creating event has been applied.
    fn id(&self) -> Option<AggregateId>;

    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
