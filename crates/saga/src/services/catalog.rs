//! Product catalog lookups used only for display names.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::ProductId;
use tokio::sync::RwLock;

use crate::error::SagaError;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Display name of a product, or None if the catalog does not know it.
    async fn product_name(&self, product_id: ProductId) -> Result<Option<String>, SagaError>;
}

#[derive(Debug, Default)]
struct CatalogState {
    names: RwLock<HashMap<ProductId, String>>,
    unavailable: AtomicBool,
}

/// In-memory catalog for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<CatalogState>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, product_id: impl Into<ProductId>, name: impl Into<String>) {
        self.state
            .names
            .write()
            .await
            .insert(product_id.into(), name.into());
    }

    /// Makes every lookup fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn product_name(&self, product_id: ProductId) -> Result<Option<String>, SagaError> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(SagaError::Downstream {
                service: "product",
                message: "catalog unavailable".into(),
            });
        }
        Ok(self.state.names.read().await.get(&product_id).cloned())
    }
}
