//! Persisted step log of one placement saga.

use common::AggregateId;
use domain::{Aggregate, DomainEvent, UserId};
use event_store::{AppendOptions, EventEnvelope, EventStore};

use crate::aggregate::SagaInstance;
use crate::error::Result;
use crate::events::SagaEvent;
use crate::placement;

/// Appends saga events one at a time and keeps the folded state in step.
///
/// Every append carries the version the log was at, so two writers on the
/// same saga cannot interleave silently.
pub(crate) struct SagaLog<'a, S: EventStore> {
    store: &'a S,
    saga_id: AggregateId,
    saga: SagaInstance,
}

impl<'a, S: EventStore> SagaLog<'a, S> {
    pub(crate) async fn start(
        store: &'a S,
        saga_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
    ) -> Result<Self> {
        let mut log = Self {
            store,
            saga_id,
            saga: SagaInstance::default(),
        };
        log.record(SagaEvent::saga_started(
            saga_id,
            order_id,
            user_id,
            placement::SAGA_TYPE,
        ))
        .await?;
        Ok(log)
    }

    /// Replays the saga's events. None if nothing was ever recorded.
    pub(crate) async fn load(store: &'a S, saga_id: AggregateId) -> Result<Option<Self>> {
        let events = store.get_events_for_aggregate(saga_id).await?;
        if events.is_empty() {
            return Ok(None);
        }

        let mut saga = SagaInstance::default();
        for envelope in events {
            let event: SagaEvent = serde_json::from_value(envelope.payload)?;
            saga.apply(event);
            saga.set_version(envelope.version);
        }
        Ok(Some(Self {
            store,
            saga_id,
            saga,
        }))
    }

    pub(crate) fn saga(&self) -> &SagaInstance {
        &self.saga
    }

    pub(crate) fn saga_id(&self) -> AggregateId {
        self.saga_id
    }

    pub(crate) fn into_saga(self) -> SagaInstance {
        self.saga
    }

    pub(crate) async fn record(&mut self, event: SagaEvent) -> Result<()> {
        let current = self.saga.version();
        let next = current.next();

        let envelope = EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(self.saga_id)
            .aggregate_type(SagaInstance::aggregate_type())
            .version(next)
            .payload(&event)?
            .build()?;

        let new_version = self
            .store
            .append(vec![envelope], AppendOptions::after(current))
            .await?;

        self.saga.apply(event);
        self.saga.set_version(new_version);
        Ok(())
    }
}
