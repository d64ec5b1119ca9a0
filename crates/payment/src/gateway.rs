//! Provider-side payment orders.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use domain::Money;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{Result, VerifierError};

/// A payment order opened at the provider. The client completes payment
/// against `id` and the provider signs its callback with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderOrder {
    pub id: String,
    pub receipt: String,
    /// Amount in the currency's minor unit.
    pub amount_minor: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, receipt: &str, amount: Money, currency: &str)
    -> Result<ProviderOrder>;
}

#[derive(Debug, Default)]
struct GatewayState {
    next_id: AtomicU64,
    orders: RwLock<Vec<ProviderOrder>>,
    fail: AtomicBool,
}

/// Gateway double handing out sequential `order_0001` style ids.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<GatewayState>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn orders(&self) -> Vec<ProviderOrder> {
        self.state.orders.read().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_order(
        &self,
        receipt: &str,
        amount: Money,
        currency: &str,
    ) -> Result<ProviderOrder> {
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(VerifierError::Gateway("provider unavailable".into()));
        }
        let seq = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let order = ProviderOrder {
            id: format!("order_{seq:04}"),
            receipt: receipt.to_owned(),
            amount_minor: amount.cents(),
            currency: currency.to_owned(),
        };
        self.state.orders.write().await.push(order.clone());
        Ok(order)
    }
}
