//! Cart snapshot provider trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::SagaError;

/// One line of a cart, priced when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: None,
            quantity,
            unit_price,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }
}

/// The cart contents at the moment placement started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub user_id: UserId,
    pub items: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Read-only view of the cart service plus the clear operation.
#[async_trait]
pub trait CartProvider: Send + Sync {
    async fn get_cart(&self, user_id: UserId) -> Result<CartSnapshot, SagaError>;

    async fn clear_cart(&self, user_id: UserId) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct CartState {
    carts: RwLock<HashMap<UserId, Vec<CartLine>>>,
    fail_on_get: AtomicBool,
    fail_on_clear: AtomicBool,
}

/// In-memory cart service for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartProvider {
    state: Arc<CartState>,
}

impl InMemoryCartProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_cart(&self, user_id: impl Into<UserId>, items: Vec<CartLine>) {
        self.state
            .carts
            .write()
            .await
            .insert(user_id.into(), items);
    }

    pub fn set_fail_on_get(&self, fail: bool) {
        self.state.fail_on_get.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_clear(&self, fail: bool) {
        self.state.fail_on_clear.store(fail, Ordering::SeqCst);
    }

    pub async fn item_count(&self, user_id: impl Into<UserId>) -> usize {
        self.state
            .carts
            .read()
            .await
            .get(&user_id.into())
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl CartProvider for InMemoryCartProvider {
    async fn get_cart(&self, user_id: UserId) -> Result<CartSnapshot, SagaError> {
        if self.state.fail_on_get.load(Ordering::SeqCst) {
            return Err(SagaError::Downstream {
                service: "cart",
                message: "cart service unavailable".into(),
            });
        }
        let items = self
            .state
            .carts
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        Ok(CartSnapshot { user_id, items })
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), SagaError> {
        if self.state.fail_on_clear.load(Ordering::SeqCst) {
            return Err(SagaError::Downstream {
                service: "cart",
                message: "cart service unavailable".into(),
            });
        }
        self.state.carts.write().await.remove(&user_id);
        Ok(())
    }
}
