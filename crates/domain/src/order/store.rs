//! Durable order records backed by the event store.

use common::AggregateId;
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::CommandHandler;
use crate::error::DomainError;

use super::{Order, OrderEvent, OrderItem, OrderStatus, UserId};

/// Order store.
///
/// Every mutation goes through the command handler, so concurrent writers
/// on the same order are rejected with a concurrency conflict rather than
/// silently overwriting each other.
pub struct OrderStore<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Persists a new order in CREATED / PENDING.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn place_order(
        &self,
        order_id: AggregateId,
        user_id: UserId,
        items: Vec<OrderItem>,
    ) -> Result<Order, DomainError> {
        let result = self
            .handler
            .execute(order_id, |order| order.place(order_id, user_id, items))
            .await?;
        metrics::counter!("orders_placed_total").increment(1);
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, order_id: AggregateId) -> Result<Order, DomainError> {
        self.handler
            .execute(order_id, |order| order.confirm_payment())
            .await
            .map(|r| r.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fail_payment(
        &self,
        order_id: AggregateId,
        reason: &str,
    ) -> Result<Order, DomainError> {
        self.handler
            .execute(order_id, |order| order.fail_payment(reason))
            .await
            .map(|r| r.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: AggregateId,
        reason: &str,
        cancelled_by: Option<String>,
    ) -> Result<Order, DomainError> {
        self.handler
            .execute(order_id, |order| order.cancel(reason, cancelled_by))
            .await
            .map(|r| r.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn advance_status(
        &self,
        order_id: AggregateId,
        target: OrderStatus,
    ) -> Result<Order, DomainError> {
        self.handler
            .execute(order_id, |order| order.advance_status(target))
            .await
            .map(|r| r.aggregate)
    }

    /// Loads an order by ID. Returns None if it was never placed.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// Returns every order placed by `user_id`, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, DomainError> {
        let placed = self.handler.store().get_events_by_type("OrderPlaced").await?;

        let mut orders = Vec::new();
        for envelope in placed {
            if envelope.aggregate_type != Order::aggregate_type() {
                continue;
            }
            let OrderEvent::OrderPlaced(data) = serde_json::from_value::<OrderEvent>(envelope.payload)?
            else {
                continue;
            };
            if data.user_id != user_id {
                continue;
            }
            if let Some(order) = self.get_order(data.order_id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}
