//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Loads aggregates, runs commands against them and appends the results.
///
/// Appends use the loaded version as the expected version, so two writers
/// racing on one aggregate cannot both succeed.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replays an aggregate's events. Unknown IDs yield a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command and persists the resulting events.
    ///
    /// `command_fn` sees the current state and returns the events to record.
    /// An empty list is a no-op and nothing is appended.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        let envelopes = Self::build_envelopes(aggregate_id, current_version, &events)?;
        let new_version = self
            .store
            .append(envelopes, AppendOptions::after(current_version))
            .await?;

        aggregate.apply_events(events.iter().cloned());
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    fn build_envelopes(
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut version = current_version;
        events
            .iter()
            .map(|event| -> Result<EventEnvelope, DomainError> {
                version = version.next();
                let envelope = EventEnvelope::builder()
                    .aggregate_id(aggregate_id)
                    .aggregate_type(A::aggregate_type())
                    .event_type(event.event_type())
                    .version(version)
                    .payload(event)?
                    .build()?;
                Ok(envelope)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{EventStoreError, InMemoryEventStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum LampEvent {
        Installed { id: AggregateId },
        Switched { on: bool },
    }

    impl DomainEvent for LampEvent {
        fn event_type(&self) -> &'static str {
            match self {
                LampEvent::Installed { .. } => "LampInstalled",
                LampEvent::Switched { .. } => "LampSwitched",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Lamp {
        id: Option<AggregateId>,
        on: bool,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("lamp is already {0}")]
    struct LampError(&'static str);

    impl From<LampError> for DomainError {
        fn from(e: LampError) -> Self {
            DomainError::AggregateNotFound {
                aggregate_type: "Lamp",
                aggregate_id: e.to_string(),
            }
        }
    }

    impl Aggregate for Lamp {
        type Event = LampEvent;
        type Error = LampError;

        fn aggregate_type() -> &'static str {
            "Lamp"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                LampEvent::Installed { id } => self.id = Some(id),
                LampEvent::Switched { on } => self.on = on,
            }
        }
    }

    fn switch_on(lamp: &Lamp) -> Result<Vec<LampEvent>, LampError> {
        if lamp.on {
            return Err(LampError("on"));
        }
        Ok(vec![LampEvent::Switched { on: true }])
    }

    #[tokio::test]
    async fn execute_persists_and_applies_events() {
        let handler: CommandHandler<_, Lamp> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        handler
            .execute(id, |_| Ok(vec![LampEvent::Installed { id }]))
            .await
            .unwrap();
        let result = handler.execute(id, switch_on).await.unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert!(result.aggregate.on);

        let reloaded = handler.load(id).await.unwrap();
        assert!(reloaded.on);
        assert_eq!(reloaded.version(), Version::new(2));
    }

    #[tokio::test]
    async fn rejected_command_appends_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Lamp> = CommandHandler::new(store.clone());
        let id = AggregateId::new();
        handler
            .execute(id, |_| {
                Ok(vec![
                    LampEvent::Installed { id },
                    LampEvent::Switched { on: true },
                ])
            })
            .await
            .unwrap();

        assert!(handler.execute(id, switch_on).await.is_err());
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn empty_command_is_a_no_op() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Lamp> = CommandHandler::new(store.clone());

        let result = handler
            .execute(AggregateId::new(), |_| Ok(vec![]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn load_existing_distinguishes_missing_aggregates() {
        let handler: CommandHandler<_, Lamp> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();
        assert!(handler.load_existing(id).await.unwrap().is_none());

        handler
            .execute(id, |_| Ok(vec![LampEvent::Installed { id }]))
            .await
            .unwrap();
        assert!(handler.load_existing(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_writer_surfaces_concurrency_conflict() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Lamp> = CommandHandler::new(store.clone());
        let id = AggregateId::new();
        handler
            .execute(id, |_| Ok(vec![LampEvent::Installed { id }]))
            .await
            .unwrap();

        // Write from a load taken before another command landed.
        let stale = handler.load(id).await.unwrap();
        handler.execute(id, switch_on).await.unwrap();
        let envelopes = CommandHandler::<InMemoryEventStore, Lamp>::build_envelopes(
            id,
            stale.version(),
            &[LampEvent::Switched { on: false }],
        )
        .unwrap();
        let result = store
            .append(envelopes, AppendOptions::after(stale.version()))
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }
}
