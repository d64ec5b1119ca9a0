use common::AggregateId;
use event_store::EventStore;

use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::order::{Money, UserId};

use super::Payment;

/// Payment records, one per order.
///
/// The payment ID is derived from the order ID, so lookups by order need no
/// secondary index.
pub struct PaymentStore<S: EventStore> {
    handler: CommandHandler<S, Payment>,
}

impl<S: EventStore> PaymentStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn payment_id_for(order_id: AggregateId) -> AggregateId {
        order_id.derive("payment")
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(
        &self,
        order_id: AggregateId,
        user_id: UserId,
        amount: Money,
        currency: &str,
        provider_order_ref: &str,
    ) -> Result<Payment, DomainError> {
        let payment_id = Self::payment_id_for(order_id);
        self.handler
            .execute(payment_id, |payment| {
                payment.create(
                    payment_id,
                    order_id,
                    user_id,
                    amount,
                    currency,
                    provider_order_ref,
                )
            })
            .await
            .map(|r| r.aggregate)
    }

    #[tracing::instrument(skip(self, signature))]
    pub async fn mark_succeeded(
        &self,
        order_id: AggregateId,
        provider_payment_ref: &str,
        signature: &str,
    ) -> Result<Payment, DomainError> {
        self.handler
            .execute(Self::payment_id_for(order_id), |payment| {
                payment.succeed(provider_payment_ref, signature)
            })
            .await
            .map(|r| r.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_declined(
        &self,
        order_id: AggregateId,
        provider_payment_ref: Option<String>,
        reason: &str,
    ) -> Result<Payment, DomainError> {
        self.handler
            .execute(Self::payment_id_for(order_id), |payment| {
                payment.decline(provider_payment_ref, reason)
            })
            .await
            .map(|r| r.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_order_synced(&self, order_id: AggregateId) -> Result<Payment, DomainError> {
        self.handler
            .execute(Self::payment_id_for(order_id), Payment::mark_order_synced)
            .await
            .map(|r| r.aggregate)
    }

    pub async fn get_payment(&self, payment_id: AggregateId) -> Result<Option<Payment>, DomainError> {
        self.handler.load_existing(payment_id).await
    }

    /// Loads the payment opened for `order_id`, if any.
    pub async fn find_by_order(&self, order_id: AggregateId) -> Result<Option<Payment>, DomainError> {
        self.get_payment(Self::payment_id_for(order_id)).await
    }
}
