//! The verifier's view of the order side.

use async_trait::async_trait;
use common::AggregateId;
use domain::PaymentStatus;
use event_store::EventStore;
use saga::{CartProvider, OrderOrchestrator, OrderView, ProductCatalog, SagaError, StockLedger};

#[async_trait]
pub trait OrderPort: Send + Sync {
    async fn get_order(&self, order_id: AggregateId) -> Result<OrderView, SagaError>;

    async fn update_payment_status(
        &self,
        order_id: AggregateId,
        status: PaymentStatus,
    ) -> Result<OrderView, SagaError>;
}

#[async_trait]
impl<S, L, C, K> OrderPort for OrderOrchestrator<S, L, C, K>
where
    S: EventStore + Clone + 'static,
    L: StockLedger + 'static,
    C: CartProvider + 'static,
    K: ProductCatalog + 'static,
{
    async fn get_order(&self, order_id: AggregateId) -> Result<OrderView, SagaError> {
        OrderOrchestrator::get_order(self, order_id).await
    }

    async fn update_payment_status(
        &self,
        order_id: AggregateId,
        status: PaymentStatus,
    ) -> Result<OrderView, SagaError> {
        OrderOrchestrator::update_payment_status(self, order_id, status).await
    }
}
