//! Stock ledger trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::AggregateId;
use domain::ProductId;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::{Result, SagaError};

/// Identifies one reservation: a product line of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationKey {
    pub order_id: AggregateId,
    pub product_id: ProductId,
}

impl ReservationKey {
    pub fn new(order_id: AggregateId, product_id: ProductId) -> Self {
        Self {
            order_id,
            product_id,
        }
    }
}

/// Whether a ledger call changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOutcome {
    Applied,
    /// The call was a replay of one already applied.
    AlreadyApplied,
}

/// Quantities held for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub total: u32,
    pub reserved: u32,
}

impl StockLevel {
    pub fn available(&self) -> u32 {
        self.total - self.reserved
    }
}

/// State of a single reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEntry {
    Reserved(u32),
    Confirmed(u32),
    /// Released, or a tombstone (`Released(0)`) left by releasing a key that
    /// was never reserved.
    Released(u32),
}

impl ReservationEntry {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationEntry::Reserved(_) => "reserved",
            ReservationEntry::Confirmed(_) => "confirmed",
            ReservationEntry::Released(_) => "released",
        }
    }
}

/// Source of truth for product quantities.
///
/// Every call is keyed by `(order_id, product_id)` and is idempotent per key:
/// replaying a call returns [`LedgerOutcome::AlreadyApplied`] and changes
/// nothing.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Holds `quantity` units for the key. Fails with `InsufficientStock`
    /// when fewer are available.
    async fn reserve(&self, key: ReservationKey, quantity: u32) -> Result<LedgerOutcome>;

    /// Consumes a reservation: total and reserved both drop by `quantity`.
    async fn confirm(&self, key: ReservationKey, quantity: u32) -> Result<LedgerOutcome>;

    /// Returns a reservation to available stock.
    async fn release(&self, key: ReservationKey, quantity: u32) -> Result<LedgerOutcome>;

    async fn stock_level(&self, product_id: ProductId) -> Result<StockLevel>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    Reserve,
    Confirm,
    Release,
}

/// One recorded ledger call.
#[derive(Debug, Clone)]
pub struct LedgerCall {
    pub op: LedgerOp,
    pub key: ReservationKey,
    pub quantity: u32,
    /// None when the call failed.
    pub outcome: Option<LedgerOutcome>,
}

#[derive(Debug, Default)]
struct ProductStock {
    total: u32,
    reserved: u32,
    reservations: HashMap<AggregateId, ReservationEntry>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    products: RwLock<HashMap<ProductId, Arc<Mutex<ProductStock>>>>,
    calls: Mutex<Vec<LedgerCall>>,
    fail_on_reserve: Mutex<HashSet<ProductId>>,
    fail_on_confirm: AtomicBool,
    fail_on_release: AtomicBool,
    reserve_delay: Mutex<Option<Duration>>,
}

/// In-memory stock ledger.
///
/// Each product has its own mutex; a check-and-update for one product never
/// waits on another product.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockLedger {
    inner: Arc<LedgerInner>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a product's total units, creating the product if needed.
    /// Reservations already held are kept, so the total cannot drop below
    /// the reserved count.
    pub async fn set_stock(
        &self,
        product_id: impl Into<ProductId>,
        total: u32,
    ) -> Result<StockLevel> {
        let product_id = product_id.into();
        let product = {
            let mut products = self.inner.products.write().await;
            products.entry(product_id).or_default().clone()
        };

        let mut stock = product.lock().await;
        if total < stock.reserved {
            return Err(SagaError::StockBelowReserved {
                product_id,
                total,
                reserved: stock.reserved,
            });
        }
        stock.total = total;
        Ok(StockLevel {
            product_id,
            total,
            reserved: stock.reserved,
        })
    }

    /// Registers a product with `total` units, replacing any existing entry
    /// and its reservations.
    pub async fn add_product(&self, product_id: impl Into<ProductId>, total: u32) {
        let stock = ProductStock {
            total,
            ..ProductStock::default()
        };
        self.inner
            .products
            .write()
            .await
            .insert(product_id.into(), Arc::new(Mutex::new(stock)));
    }

    /// Adds units to an existing product.
    pub async fn restock(&self, product_id: impl Into<ProductId>, quantity: u32) -> Result<()> {
        let product = self.product(product_id.into()).await?;
        let mut stock = product.lock().await;
        stock.total = stock.total.saturating_add(quantity);
        Ok(())
    }

    /// Makes reserve calls for `product_id` fail as if the ledger were down.
    pub async fn set_fail_on_reserve(&self, product_id: impl Into<ProductId>, fail: bool) {
        let mut failing = self.inner.fail_on_reserve.lock().await;
        let product_id = product_id.into();
        if fail {
            failing.insert(product_id);
        } else {
            failing.remove(&product_id);
        }
    }

    pub fn set_fail_on_confirm(&self, fail: bool) {
        self.inner.fail_on_confirm.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_release(&self, fail: bool) {
        self.inner.fail_on_release.store(fail, Ordering::SeqCst);
    }

    /// Delays every reserve call before it touches any state.
    pub async fn set_reserve_delay(&self, delay: Option<Duration>) {
        *self.inner.reserve_delay.lock().await = delay;
    }

    /// Every call made so far, in order.
    pub async fn operations(&self) -> Vec<LedgerCall> {
        self.inner.calls.lock().await.clone()
    }

    /// Number of calls of `op` for `key` that changed state.
    pub async fn applied_count(&self, op: LedgerOp, key: ReservationKey) -> usize {
        self.inner
            .calls
            .lock()
            .await
            .iter()
            .filter(|c| c.op == op && c.key == key && c.outcome == Some(LedgerOutcome::Applied))
            .count()
    }

    pub async fn reservation(&self, key: ReservationKey) -> Option<ReservationEntry> {
        let product = self.product(key.product_id).await.ok()?;
        let stock = product.lock().await;
        stock.reservations.get(&key.order_id).copied()
    }

    async fn product(&self, product_id: ProductId) -> Result<Arc<Mutex<ProductStock>>> {
        self.inner
            .products
            .read()
            .await
            .get(&product_id)
            .cloned()
            .ok_or(SagaError::ProductNotFound(product_id))
    }

    async fn record(
        &self,
        op: LedgerOp,
        key: ReservationKey,
        quantity: u32,
        result: &Result<LedgerOutcome>,
    ) {
        self.inner.calls.lock().await.push(LedgerCall {
            op,
            key,
            quantity,
            outcome: result.as_ref().ok().copied(),
        });
    }

    async fn apply_reserve(&self, key: ReservationKey, quantity: u32) -> Result<LedgerOutcome> {
        ensure_positive(key, quantity)?;
        let delay = *self.inner.reserve_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.inner.fail_on_reserve.lock().await.contains(&key.product_id) {
            return Err(SagaError::Ledger(format!(
                "reserve unavailable for product {}",
                key.product_id
            )));
        }

        let product = self.product(key.product_id).await?;
        let mut stock = product.lock().await;
        match stock.reservations.get(&key.order_id).copied() {
            Some(ReservationEntry::Reserved(held)) if held == quantity => {
                return Ok(LedgerOutcome::AlreadyApplied);
            }
            Some(ReservationEntry::Reserved(held)) => {
                return Err(SagaError::QuantityMismatch {
                    product_id: key.product_id,
                    reserved: held,
                    requested: quantity,
                });
            }
            Some(settled) => {
                return Err(SagaError::ReservationSettled {
                    order_id: key.order_id,
                    product_id: key.product_id,
                    state: settled.as_str(),
                });
            }
            None => {}
        }

        let available = stock.total - stock.reserved;
        if available < quantity {
            return Err(SagaError::InsufficientStock {
                product_id: key.product_id,
                requested: quantity,
                available,
            });
        }
        stock.reserved += quantity;
        stock
            .reservations
            .insert(key.order_id, ReservationEntry::Reserved(quantity));
        Ok(LedgerOutcome::Applied)
    }

    async fn apply_confirm(&self, key: ReservationKey, quantity: u32) -> Result<LedgerOutcome> {
        ensure_positive(key, quantity)?;
        if self.inner.fail_on_confirm.load(Ordering::SeqCst) {
            return Err(SagaError::Ledger("confirm unavailable".into()));
        }

        let product = self.product(key.product_id).await?;
        let mut stock = product.lock().await;
        let entry = stock.reservations.get(&key.order_id).copied();
        match entry {
            None => Err(SagaError::ReservationNotFound {
                order_id: key.order_id,
                product_id: key.product_id,
            }),
            Some(ReservationEntry::Confirmed(_)) => Ok(LedgerOutcome::AlreadyApplied),
            Some(released @ ReservationEntry::Released(_)) => Err(SagaError::ReservationSettled {
                order_id: key.order_id,
                product_id: key.product_id,
                state: released.as_str(),
            }),
            Some(ReservationEntry::Reserved(held)) if held != quantity => {
                Err(SagaError::QuantityMismatch {
                    product_id: key.product_id,
                    reserved: held,
                    requested: quantity,
                })
            }
            Some(ReservationEntry::Reserved(held)) => {
                stock.total -= held;
                stock.reserved -= held;
                stock
                    .reservations
                    .insert(key.order_id, ReservationEntry::Confirmed(held));
                Ok(LedgerOutcome::Applied)
            }
        }
    }

    async fn apply_release(&self, key: ReservationKey, quantity: u32) -> Result<LedgerOutcome> {
        ensure_positive(key, quantity)?;
        if self.inner.fail_on_release.load(Ordering::SeqCst) {
            return Err(SagaError::Ledger("release unavailable".into()));
        }

        let product = self.product(key.product_id).await?;
        let mut stock = product.lock().await;
        let entry = stock.reservations.get(&key.order_id).copied();
        match entry {
            None => {
                stock
                    .reservations
                    .insert(key.order_id, ReservationEntry::Released(0));
                Ok(LedgerOutcome::AlreadyApplied)
            }
            Some(ReservationEntry::Released(_)) => Ok(LedgerOutcome::AlreadyApplied),
            Some(confirmed @ ReservationEntry::Confirmed(_)) => {
                Err(SagaError::ReservationSettled {
                    order_id: key.order_id,
                    product_id: key.product_id,
                    state: confirmed.as_str(),
                })
            }
            Some(ReservationEntry::Reserved(held)) if held != quantity => {
                Err(SagaError::QuantityMismatch {
                    product_id: key.product_id,
                    reserved: held,
                    requested: quantity,
                })
            }
            Some(ReservationEntry::Reserved(held)) => {
                stock.reserved -= held;
                stock
                    .reservations
                    .insert(key.order_id, ReservationEntry::Released(held));
                Ok(LedgerOutcome::Applied)
            }
        }
    }
}

fn ensure_positive(key: ReservationKey, quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(SagaError::InvalidQuantity {
            product_id: key.product_id,
            quantity,
        });
    }
    Ok(())
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    #[tracing::instrument(skip(self), fields(order_id = %key.order_id, product_id = %key.product_id))]
    async fn reserve(&self, key: ReservationKey, quantity: u32) -> Result<LedgerOutcome> {
        let result = self.apply_reserve(key, quantity).await;
        self.record(LedgerOp::Reserve, key, quantity, &result).await;
        if matches!(result, Ok(LedgerOutcome::Applied)) {
            metrics::counter!("stock_reservations_total").increment(1);
        }
        result
    }

    #[tracing::instrument(skip(self), fields(order_id = %key.order_id, product_id = %key.product_id))]
    async fn confirm(&self, key: ReservationKey, quantity: u32) -> Result<LedgerOutcome> {
        let result = self.apply_confirm(key, quantity).await;
        self.record(LedgerOp::Confirm, key, quantity, &result).await;
        result
    }

    #[tracing::instrument(skip(self), fields(order_id = %key.order_id, product_id = %key.product_id))]
    async fn release(&self, key: ReservationKey, quantity: u32) -> Result<LedgerOutcome> {
        let result = self.apply_release(key, quantity).await;
        self.record(LedgerOp::Release, key, quantity, &result).await;
        result
    }

    async fn stock_level(&self, product_id: ProductId) -> Result<StockLevel> {
        let product = self.product(product_id).await?;
        let stock = product.lock().await;
        Ok(StockLevel {
            product_id,
            total: stock.total,
            reserved: stock.reserved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger_with(product: i64, total: u32) -> InMemoryStockLedger {
        let ledger = InMemoryStockLedger::new();
        ledger.add_product(product, total).await;
        ledger
    }

    fn key(product: i64) -> (AggregateId, ReservationKey) {
        let order_id = AggregateId::new();
        (order_id, ReservationKey::new(order_id, ProductId::new(product)))
    }

    #[tokio::test]
    async fn test_set_stock_keeps_pending_reservations() {
        let ledger = ledger_with(10, 5).await;
        let (_, k) = key(10);
        ledger.reserve(k, 3).await.unwrap();

        let level = ledger.set_stock(10, 8).await.unwrap();
        assert_eq!((level.total, level.reserved), (8, 3));
        assert_eq!(ledger.confirm(k, 3).await.unwrap(), LedgerOutcome::Applied);

        let level = ledger.stock_level(ProductId::new(10)).await.unwrap();
        assert_eq!((level.total, level.reserved), (5, 0));
    }

    #[tokio::test]
    async fn test_set_stock_refuses_total_below_reserved() {
        let ledger = ledger_with(10, 5).await;
        let (_, k) = key(10);
        ledger.reserve(k, 4).await.unwrap();

        let err = ledger.set_stock(10, 3).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::StockBelowReserved {
                total: 3,
                reserved: 4,
                ..
            }
        ));
        let level = ledger.stock_level(ProductId::new(10)).await.unwrap();
        assert_eq!((level.total, level.reserved), (5, 4));
    }

    #[tokio::test]
    async fn test_set_stock_creates_unknown_products() {
        let ledger = InMemoryStockLedger::new();
        let level = ledger.set_stock(12, 7).await.unwrap();
        assert_eq!((level.total, level.reserved), (7, 0));
    }

    #[tokio::test]
    async fn test_reserve_is_visible_immediately() {
        let ledger = ledger_with(10, 5).await;
        let (_, k) = key(10);

        assert_eq!(ledger.reserve(k, 3).await.unwrap(), LedgerOutcome::Applied);
        let level = ledger.stock_level(ProductId::new(10)).await.unwrap();
        assert_eq!(level.reserved, 3);
        assert_eq!(level.available(), 2);
    }

    #[tokio::test]
    async fn test_reserve_refuses_oversell() {
        let ledger = ledger_with(10, 2).await;
        let (_, k) = key(10);

        let err = ledger.reserve(k, 3).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert!(ledger.reservation(k).await.is_none());
    }

    #[tokio::test]
    async fn test_replayed_reserve_is_a_no_op() {
        let ledger = ledger_with(10, 5).await;
        let (_, k) = key(10);

        ledger.reserve(k, 2).await.unwrap();
        assert_eq!(
            ledger.reserve(k, 2).await.unwrap(),
            LedgerOutcome::AlreadyApplied
        );
        assert!(matches!(
            ledger.reserve(k, 3).await,
            Err(SagaError::QuantityMismatch { .. })
        ));
        assert_eq!(ledger.stock_level(ProductId::new(10)).await.unwrap().reserved, 2);
    }

    #[tokio::test]
    async fn test_confirm_consumes_reservation_once() {
        let ledger = ledger_with(10, 5).await;
        let (_, k) = key(10);
        ledger.reserve(k, 2).await.unwrap();

        assert_eq!(ledger.confirm(k, 2).await.unwrap(), LedgerOutcome::Applied);
        assert_eq!(
            ledger.confirm(k, 2).await.unwrap(),
            LedgerOutcome::AlreadyApplied
        );

        let level = ledger.stock_level(ProductId::new(10)).await.unwrap();
        assert_eq!((level.total, level.reserved), (3, 0));
        assert_eq!(ledger.applied_count(LedgerOp::Confirm, k).await, 1);
        assert!(matches!(
            ledger.release(k, 2).await,
            Err(SagaError::ReservationSettled { .. })
        ));
    }

    #[tokio::test]
    async fn test_confirm_without_reservation_fails() {
        let ledger = ledger_with(10, 5).await;
        let (_, k) = key(10);
        assert!(matches!(
            ledger.confirm(k, 1).await,
            Err(SagaError::ReservationNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let ledger = ledger_with(10, 5).await;
        let (_, k) = key(10);
        ledger.reserve(k, 4).await.unwrap();

        assert_eq!(ledger.release(k, 4).await.unwrap(), LedgerOutcome::Applied);
        assert_eq!(
            ledger.release(k, 4).await.unwrap(),
            LedgerOutcome::AlreadyApplied
        );
        let level = ledger.stock_level(ProductId::new(10)).await.unwrap();
        assert_eq!((level.total, level.reserved), (5, 0));
        assert!(matches!(
            ledger.confirm(k, 4).await,
            Err(SagaError::ReservationSettled { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_before_reserve_blocks_late_reserve() {
        let ledger = ledger_with(10, 5).await;
        let (_, k) = key(10);

        assert_eq!(
            ledger.release(k, 2).await.unwrap(),
            LedgerOutcome::AlreadyApplied
        );
        assert_eq!(ledger.reservation(k).await, Some(ReservationEntry::Released(0)));
        assert!(matches!(
            ledger.reserve(k, 2).await,
            Err(SagaError::ReservationSettled { .. })
        ));
        assert_eq!(ledger.stock_level(ProductId::new(10)).await.unwrap().reserved, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_and_zero_quantity() {
        let ledger = ledger_with(10, 5).await;
        let (_, unknown) = key(99);
        let (_, k) = key(10);

        assert!(matches!(
            ledger.reserve(unknown, 1).await,
            Err(SagaError::ProductNotFound(_))
        ));
        assert!(matches!(
            ledger.reserve(k, 0).await,
            Err(SagaError::InvalidQuantity { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_reserves_never_oversell() {
        let ledger = ledger_with(10, 10).await;

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    let (_, k) = key(10);
                    ledger.reserve(k, 1).await
                })
            })
            .collect();

        let mut applied = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                applied += 1;
            }
        }

        assert_eq!(applied, 10);
        let level = ledger.stock_level(ProductId::new(10)).await.unwrap();
        assert_eq!(level.reserved, 10);
        assert_eq!(level.available(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures_are_recorded() {
        let ledger = ledger_with(10, 5).await;
        let (_, k) = key(10);
        ledger.set_fail_on_reserve(10, true).await;

        assert!(matches!(ledger.reserve(k, 1).await, Err(SagaError::Ledger(_))));

        let calls = ledger.operations().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].op, LedgerOp::Reserve);
        assert!(calls[0].outcome.is_none());
    }
}
