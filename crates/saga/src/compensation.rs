//! Outcome of a stock rollback.

use domain::ProductId;
use serde::{Deserialize, Serialize};

/// A release that could not be applied and is left for the retry task or
/// the recovery sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFailure {
    pub product_id: ProductId,
    pub quantity: u32,
    pub error: String,
}

/// What a compensation pass managed to undo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationReport {
    pub released: Vec<ProductId>,
    pub failed: Vec<ReleaseFailure>,
}

impl CompensationReport {
    /// True when every targeted release was applied.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn record_released(&mut self, product_id: ProductId) {
        self.released.push(product_id);
    }

    pub(crate) fn record_failed(&mut self, product_id: ProductId, quantity: u32, error: String) {
        self.failed.push(ReleaseFailure {
            product_id,
            quantity,
            error,
        });
    }
}
