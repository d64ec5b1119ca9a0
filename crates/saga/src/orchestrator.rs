//! Order orchestrator: placement saga, cancellation and payment/fulfilment
//! transitions.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::AggregateId;
use domain::{
    Aggregate, DomainError, Order, OrderError, OrderItem, OrderStatus, OrderStore, PaymentStatus,
    ProductId, UserId, quantities_by_product,
};
use event_store::EventStore;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::Instrument;

use crate::aggregate::SagaInstance;
use crate::compensation::{CompensationReport, ReleaseFailure};
use crate::error::{Result, SagaError};
use crate::events::{RequestedItem, SagaEvent};
use crate::locks::KeyedLocks;
use crate::placement;
use crate::retry::{RetryPolicy, with_timeout};
use crate::saga_log::SagaLog;
use crate::services::{CartLine, CartProvider, ProductCatalog, ReservationKey, StockLedger};
use crate::state::SagaState;
use crate::view::OrderView;

/// Tuning for downstream calls.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound for every single ledger, cart, catalog or store call.
    pub call_timeout: Duration,
    /// Backoff for releases that failed during compensation.
    pub compensation_retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(2),
            compensation_retry: RetryPolicy::default(),
        }
    }
}

/// Counts from one recovery sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub examined: usize,
    /// Interrupted after the order was persisted; finished forward.
    pub rolled_forward: usize,
    /// Interrupted before the order was persisted; rolled back.
    pub compensated: usize,
    /// Failed sagas whose outstanding releases were retried.
    pub releases_retried: usize,
    /// Sagas still holding stock after this sweep.
    pub still_pending: usize,
    pub errors: Vec<String>,
}

/// Drives order placement and every later order transition.
///
/// Placement runs as an event-sourced saga: each step is logged before the
/// next starts, a failure compensates what was done, and
/// [`recover_incomplete`](Self::recover_incomplete) finishes sagas that were
/// interrupted by a crash. Transitions on one order are serialized with a
/// per-order lock.
pub struct OrderOrchestrator<S, L, C, K>
where
    S: EventStore,
{
    inner: Arc<Inner<S, L, C, K>>,
}

impl<S: EventStore, L, C, K> Clone for OrderOrchestrator<S, L, C, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S: EventStore, L, C, K> {
    store: S,
    orders: OrderStore<S>,
    ledger: L,
    cart: C,
    catalog: K,
    config: OrchestratorConfig,
    order_locks: KeyedLocks<AggregateId>,
    saga_locks: KeyedLocks<AggregateId>,
}

impl<S, L, C, K> OrderOrchestrator<S, L, C, K>
where
    S: EventStore + Clone + 'static,
    L: StockLedger + 'static,
    C: CartProvider + 'static,
    K: ProductCatalog + 'static,
{
    pub fn new(store: S, ledger: L, cart: C, catalog: K) -> Self {
        Self::with_config(store, ledger, cart, catalog, OrchestratorConfig::default())
    }

    pub fn with_config(store: S, ledger: L, cart: C, catalog: K, config: OrchestratorConfig) -> Self {
        let orders = OrderStore::new(store.clone());
        Self {
            inner: Arc::new(Inner {
                store,
                orders,
                ledger,
                cart,
                catalog,
                config,
                order_locks: KeyedLocks::new(),
                saga_locks: KeyedLocks::new(),
            }),
        }
    }

    /// The saga log ID for an order's placement.
    pub fn saga_id_for(order_id: AggregateId) -> AggregateId {
        order_id.derive(placement::SAGA_TYPE)
    }

    /// Places an order from the user's current cart.
    ///
    /// The saga runs on its own task: if the caller stops waiting, the saga
    /// still finishes or compensates.
    #[tracing::instrument(skip(self), fields(saga_type = placement::SAGA_TYPE))]
    pub async fn place_order(&self, user_id: UserId) -> Result<OrderView> {
        metrics::counter!("saga_executions_total").increment(1);
        let inner = self.inner.clone();
        let task = tokio::spawn(
            async move { inner.run_placement(user_id).await }.instrument(tracing::Span::current()),
        );
        task.await.map_err(|e| SagaError::Downstream {
            service: "orchestrator",
            message: e.to_string(),
        })?
    }

    /// Cancels an unpaid order and releases its stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: AggregateId) -> Result<OrderView> {
        let inner = &self.inner;
        let _guard = inner.order_locks.lock(order_id).await;
        let order = inner.load_order(order_id).await?;

        if !order.status().can_cancel() || order.payment_status() != PaymentStatus::Pending {
            return Err(SagaError::InvalidStateTransition {
                from: order.status(),
                to: OrderStatus::Cancelled,
            });
        }

        inner.release_order_items(&order).await?;
        let order = inner
            .call(
                "order.cancel",
                inner
                    .orders
                    .cancel_order(order_id, "Cancelled by customer", Some("customer".into())),
            )
            .await?;

        tracing::info!(%order_id, "order cancelled");
        inner.hydrate(&order).await
    }

    /// Applies the outcome of a payment: PAID confirms every reservation,
    /// FAILED releases them. Only allowed while payment is PENDING.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_id: AggregateId,
        status: PaymentStatus,
    ) -> Result<OrderView> {
        let inner = &self.inner;
        let _guard = inner.order_locks.lock(order_id).await;
        let order = inner.load_order(order_id).await?;

        if order.payment_status().is_settled() {
            return Err(SagaError::PaymentAlreadyProcessed {
                status: order.payment_status(),
            });
        }

        let order = match status {
            PaymentStatus::Paid => {
                if !order.status().can_confirm() {
                    return Err(SagaError::InvalidStateTransition {
                        from: order.status(),
                        to: OrderStatus::Confirmed,
                    });
                }
                for (product_id, quantity) in order.reserved_quantities() {
                    let key = ReservationKey::new(order_id, product_id);
                    inner
                        .call("stock.confirm", inner.ledger.confirm(key, quantity))
                        .await?;
                }
                inner
                    .call("order.confirm_payment", inner.orders.confirm_payment(order_id))
                    .await?
            }
            PaymentStatus::Failed => {
                if !order.status().can_cancel() {
                    return Err(SagaError::InvalidStateTransition {
                        from: order.status(),
                        to: OrderStatus::Cancelled,
                    });
                }
                inner.release_order_items(&order).await?;
                inner
                    .call(
                        "order.fail_payment",
                        inner.orders.fail_payment(order_id, "Payment failed"),
                    )
                    .await?
            }
            PaymentStatus::Pending => {
                return Err(SagaError::InvalidPaymentStatus(status.to_string()));
            }
        };

        tracing::info!(%order_id, payment_status = %order.payment_status(), "payment status updated");
        inner.hydrate(&order).await
    }

    /// Moves a confirmed order along CONFIRMED → SHIPPED → DELIVERED.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: AggregateId,
        status: OrderStatus,
    ) -> Result<OrderView> {
        let inner = &self.inner;
        let _guard = inner.order_locks.lock(order_id).await;
        inner.load_order(order_id).await?;

        let order = inner
            .call("order.advance", inner.orders.advance_status(order_id, status))
            .await?;
        inner.hydrate(&order).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<OrderView> {
        let order = self.inner.load_order(order_id).await?;
        self.inner.hydrate(&order).await
    }

    /// Every order placed by `user_id`, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderView>> {
        let inner = &self.inner;
        let orders = inner
            .call("order.list", inner.orders.orders_for_user(user_id))
            .await?;

        let mut views = Vec::with_capacity(orders.len());
        for order in &orders {
            views.push(inner.hydrate(order).await?);
        }
        Ok(views)
    }

    pub async fn get_saga(&self, saga_id: AggregateId) -> Result<SagaInstance> {
        SagaLog::load(&self.inner.store, saga_id)
            .await?
            .map(SagaLog::into_saga)
            .ok_or(SagaError::SagaNotFound(saga_id))
    }

    /// Finishes or rolls back every placement saga left mid-flight and
    /// retries releases that compensation could not apply.
    #[tracing::instrument(skip(self))]
    pub async fn recover_incomplete(&self) -> Result<RecoveryReport> {
        let inner = &self.inner;
        let saga_ids = inner
            .store
            .aggregate_ids_by_type(SagaInstance::aggregate_type())
            .await?;

        let mut report = RecoveryReport::default();
        for saga_id in saga_ids {
            if let Err(e) = inner.recover_saga(saga_id, &mut report).await {
                tracing::warn!(%saga_id, error = %e, "saga recovery failed");
                report.errors.push(format!("{saga_id}: {e}"));
            }
        }

        if report.rolled_forward + report.compensated + report.releases_retried > 0 {
            tracing::info!(?report, "recovery sweep finished");
        }
        Ok(report)
    }
}

impl<S, L, C, K> Inner<S, L, C, K>
where
    S: EventStore + Clone + 'static,
    L: StockLedger + 'static,
    C: CartProvider + 'static,
    K: ProductCatalog + 'static,
{
    /// Bounds a downstream call by the configured timeout.
    async fn call<T, E, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
        SagaError: From<E>,
    {
        with_timeout(self.config.call_timeout, operation, async move {
            fut.await.map_err(SagaError::from)
        })
        .await
    }

    async fn load_order(&self, order_id: AggregateId) -> Result<Order> {
        self.call("order.get", self.orders.get_order(order_id))
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))
    }

    /// Builds the client view; name lookups that fail degrade to None.
    async fn hydrate(&self, order: &Order) -> Result<OrderView> {
        let lookups = order.items().iter().map(|item| async move {
            match self
                .call("catalog.lookup", self.catalog.product_name(item.product_id))
                .await
            {
                Ok(name) => name,
                Err(e) => {
                    tracing::debug!(product_id = %item.product_id, error = %e, "product name unavailable");
                    None
                }
            }
        });
        let names = join_all(lookups).await;

        OrderView::from_order(order, names)
            .ok_or(SagaError::Domain(DomainError::Order(OrderError::NotPlaced)))
    }

    async fn release_order_items(&self, order: &Order) -> Result<()> {
        let order_id = order
            .id()
            .ok_or(SagaError::Domain(DomainError::Order(OrderError::NotPlaced)))?;
        for (product_id, quantity) in order.reserved_quantities() {
            let key = ReservationKey::new(order_id, product_id);
            self.call("stock.release", self.ledger.release(key, quantity))
                .await?;
        }
        Ok(())
    }

    async fn run_placement(self: Arc<Self>, user_id: UserId) -> Result<OrderView> {
        let started = Instant::now();

        let cart = self.call("cart.get", self.cart.get_cart(user_id)).await?;
        if cart.is_empty() {
            return Err(SagaError::EmptyCart(user_id));
        }
        let items: Vec<OrderItem> = merge_lines(cart.items)
            .into_iter()
            .map(|line| OrderItem::new(line.product_id, line.quantity, line.unit_price))
            .collect();
        let reservations = quantities_by_product(&items).map_err(DomainError::from)?;

        let order_id = AggregateId::new();
        let saga_id = OrderOrchestrator::<S, L, C, K>::saga_id_for(order_id);
        let _saga_guard = self.saga_locks.lock(saga_id).await;
        let mut log = SagaLog::start(&self.store, saga_id, order_id, user_id).await?;
        tracing::info!(%saga_id, %order_id, "placement saga started");

        let result = self
            .run_steps(&mut log, order_id, user_id, items, &reservations)
            .await;
        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);

        match result {
            Ok(order) => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(%saga_id, %order_id, duration, "placement saga completed");
                self.hydrate(&order).await
            }
            Err(err) => {
                metrics::counter!("saga_failed").increment(1);
                Err(err)
            }
        }
    }

    async fn run_steps(
        self: &Arc<Self>,
        log: &mut SagaLog<'_, S>,
        order_id: AggregateId,
        user_id: UserId,
        items: Vec<OrderItem>,
        reservations: &[(ProductId, u32)],
    ) -> Result<Order> {
        // Step 1: reserve every product; all attempts settle before deciding.
        let requested = reservations
            .iter()
            .map(|&(product_id, quantity)| RequestedItem {
                product_id,
                quantity,
            })
            .collect();
        log.record(SagaEvent::reservation_requested(requested)).await?;

        tracing::info!(step = placement::STEP_RESERVE_STOCK, "saga step started");
        let attempts = reservations.iter().map(|&(product_id, quantity)| async move {
            let key = ReservationKey::new(order_id, product_id);
            let result = self
                .call("stock.reserve", self.ledger.reserve(key, quantity))
                .await;
            (product_id, quantity, result)
        });
        let outcomes = join_all(attempts).await;

        let mut cause = None;
        for (product_id, quantity, result) in outcomes {
            match result {
                Ok(_) => {
                    log.record(SagaEvent::item_reserved(product_id, quantity))
                        .await?;
                }
                Err(e) => {
                    log.record(SagaEvent::item_reservation_failed(
                        product_id,
                        e.to_string(),
                        !e.is_indeterminate(),
                    ))
                    .await?;
                    cause.get_or_insert(e);
                }
            }
        }
        if let Some(cause) = cause {
            return Err(self
                .abort(log, placement::STEP_RESERVE_STOCK, cause)
                .await);
        }

        // Step 2: persist the order, priced from the cart snapshot.
        tracing::info!(step = placement::STEP_CREATE_ORDER, "saga step started");
        let order = match self
            .call("order.create", self.orders.place_order(order_id, user_id, items))
            .await
        {
            Ok(order) => order,
            Err(e) => return Err(self.abort(log, placement::STEP_CREATE_ORDER, e).await),
        };
        log.record(SagaEvent::order_created()).await?;

        // Step 3: clear the cart.
        tracing::info!(step = placement::STEP_CLEAR_CART, "saga step started");
        if let Err(e) = self.call("cart.clear", self.cart.clear_cart(user_id)).await {
            return Err(self.abort(log, placement::STEP_CLEAR_CART, e).await);
        }
        log.record(SagaEvent::cart_cleared()).await?;
        log.record(SagaEvent::saga_completed()).await?;

        Ok(order)
    }

    /// Records the failed step, compensates and wraps `cause`. Compensation
    /// problems are logged and reported but never replace `cause`.
    async fn abort(
        self: &Arc<Self>,
        log: &mut SagaLog<'_, S>,
        step: &'static str,
        cause: SagaError,
    ) -> SagaError {
        tracing::warn!(step, error = %cause, "saga step failed");

        let compensation = match log.record(SagaEvent::step_failed(step, cause.to_string())).await
        {
            Ok(()) => self.compensate(log, step, &cause.to_string()).await,
            Err(e) => Err(e),
        };
        let compensation = compensation.unwrap_or_else(|e| {
            tracing::error!(saga_id = %log.saga_id(), error = %e, "compensation could not be recorded");
            metrics::counter!("compensation_failures_total").increment(1);
            CompensationReport::default()
        });

        SagaError::OrderPlacementFailed {
            source: Box::new(cause),
            compensation,
        }
    }

    /// Voids the order if one was persisted, then releases every line that
    /// may still hold stock. Safe to run again on a partially compensated saga.
    async fn compensate(
        self: &Arc<Self>,
        log: &mut SagaLog<'_, S>,
        from_step: &str,
        reason: &str,
    ) -> Result<CompensationReport> {
        if log.saga().state().can_compensate() {
            log.record(SagaEvent::compensation_started(from_step)).await?;
        }

        let mut report = CompensationReport::default();
        let order_id = log
            .saga()
            .order_id()
            .ok_or(SagaError::SagaNotFound(log.saga_id()))?;

        if !log.saga().order_voided() && self.void_order(order_id, reason).await? {
            log.record(SagaEvent::order_voided(reason)).await?;
        }

        let pending = log.saga().pending_releases();
        let releases = pending.iter().map(|item| async move {
            let key = ReservationKey::new(order_id, item.product_id);
            let result = self
                .call("stock.release", self.ledger.release(key, item.quantity))
                .await;
            (item, result)
        });
        for (item, result) in join_all(releases).await {
            match result {
                Ok(_) => {
                    log.record(SagaEvent::item_released(item.product_id)).await?;
                    report.record_released(item.product_id);
                }
                Err(e) => {
                    tracing::error!(%order_id, product_id = %item.product_id, error = %e, "release failed");
                    metrics::counter!("compensation_failures_total").increment(1);
                    log.record(SagaEvent::item_release_failed(item.product_id, e.to_string()))
                        .await?;
                    report.record_failed(item.product_id, item.quantity, e.to_string());
                }
            }
        }

        if log.saga().state() != SagaState::Failed {
            log.record(SagaEvent::saga_failed(reason)).await?;
        }

        if !report.is_complete() {
            self.spawn_release_retry(log.saga_id(), order_id, report.failed.clone());
        }
        Ok(report)
    }

    /// Cancels the order if it exists and is still unpaid. Returns true when
    /// the order is (now) cancelled, false when no order was persisted.
    async fn void_order(&self, order_id: AggregateId, reason: &str) -> Result<bool> {
        let Some(order) = self.call("order.get", self.orders.get_order(order_id)).await? else {
            return Ok(false);
        };
        if order.status() == OrderStatus::Cancelled {
            return Ok(true);
        }
        self.call(
            "order.void",
            self.orders.cancel_order(
                order_id,
                &format!("Placement failed: {reason}"),
                Some(placement::COMPENSATION_ACTOR.to_string()),
            ),
        )
        .await?;
        tracing::info!(%order_id, "order voided by compensation");
        Ok(true)
    }

    /// Retries failed releases with backoff, off the caller's path.
    fn spawn_release_retry(
        self: &Arc<Self>,
        saga_id: AggregateId,
        order_id: AggregateId,
        failures: Vec<ReleaseFailure>,
    ) {
        let inner = self.clone();
        let task = async move {
            // Blocks until the placement or recovery run holding the saga is done.
            let _saga_guard = inner.saga_locks.lock(saga_id).await;
            let policy = inner.config.compensation_retry.clone();
            for failure in failures {
                let key = ReservationKey::new(order_id, failure.product_id);
                let result = policy
                    .run("stock.release", || {
                        inner.call("stock.release", inner.ledger.release(key, failure.quantity))
                    })
                    .await;
                match result {
                    Ok(_) => {
                        if let Err(e) = inner.record_late_release(saga_id, failure.product_id).await {
                            tracing::warn!(%saga_id, error = %e, "late release not recorded");
                        }
                    }
                    Err(e) => {
                        metrics::counter!("compensation_failures_total").increment(1);
                        tracing::error!(
                            %saga_id,
                            product_id = %failure.product_id,
                            error = %e,
                            "release retries exhausted; left for recovery sweep"
                        );
                    }
                }
            }
        };
        tokio::spawn(task.instrument(tracing::info_span!("release_retry")));
    }

    async fn record_late_release(&self, saga_id: AggregateId, product_id: ProductId) -> Result<()> {
        if let Some(mut log) = SagaLog::load(&self.store, saga_id).await? {
            log.record(SagaEvent::item_released(product_id)).await?;
        }
        Ok(())
    }

    async fn recover_saga(
        self: &Arc<Self>,
        saga_id: AggregateId,
        report: &mut RecoveryReport,
    ) -> Result<()> {
        let _saga_guard = self.saga_locks.lock(saga_id).await;
        let Some(mut log) = SagaLog::load(&self.store, saga_id).await? else {
            return Ok(());
        };
        report.examined += 1;

        let saga = log.saga();
        let order_id = saga.order_id().ok_or(SagaError::SagaNotFound(saga_id))?;
        match saga.state() {
            SagaState::Running => {
                let order_exists = self
                    .call("order.get", self.orders.get_order(order_id))
                    .await?
                    .is_some();
                if order_exists {
                    self.roll_forward(&mut log).await?;
                    report.rolled_forward += 1;
                } else {
                    let step = if saga.items().is_empty() {
                        placement::STEP_RESERVE_STOCK
                    } else {
                        placement::STEP_CREATE_ORDER
                    };
                    log.record(SagaEvent::step_failed(step, "interrupted")).await?;
                    self.compensate(&mut log, step, "Placement interrupted").await?;
                    report.compensated += 1;
                }
            }
            SagaState::Compensating => {
                let step = saga.failed_step().unwrap_or(placement::STEP_RESERVE_STOCK).to_owned();
                let reason = saga.failure_reason().unwrap_or("interrupted").to_owned();
                self.compensate(&mut log, &step, &reason).await?;
                report.compensated += 1;
            }
            SagaState::Failed if saga.has_compensation_failure() => {
                let step = saga.failed_step().unwrap_or(placement::STEP_RESERVE_STOCK).to_owned();
                let reason = saga.failure_reason().unwrap_or("interrupted").to_owned();
                self.compensate(&mut log, &step, &reason).await?;
                report.releases_retried += 1;
            }
            _ => {}
        }

        if log.saga().has_compensation_failure() {
            report.still_pending += 1;
        }
        Ok(())
    }

    async fn roll_forward(&self, log: &mut SagaLog<'_, S>) -> Result<()> {
        let saga_id = log.saga_id();
        if !log.saga().order_created() {
            log.record(SagaEvent::order_created()).await?;
        }
        if !log.saga().cart_cleared() {
            let user_id = log
                .saga()
                .user_id()
                .ok_or(SagaError::SagaNotFound(saga_id))?;
            self.call("cart.clear", self.cart.clear_cart(user_id)).await?;
            log.record(SagaEvent::cart_cleared()).await?;
        }
        log.record(SagaEvent::saga_completed()).await?;
        tracing::info!(%saga_id, "interrupted saga rolled forward");
        Ok(())
    }
}

/// Folds repeated cart lines with the same product and unit price into one
/// line at the first one's position. Lines at different prices stay apart.
fn merge_lines(lines: Vec<CartLine>) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        let same = merged
            .iter_mut()
            .find(|l| l.product_id == line.product_id && l.unit_price == line.unit_price)
            .and_then(|l| l.quantity.checked_add(line.quantity).map(|sum| (l, sum)));
        match same {
            Some((existing, quantity)) => existing.quantity = quantity,
            None => merged.push(line),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;

    #[test]
    fn merge_lines_sums_repeated_products_at_one_price() {
        let merged = merge_lines(vec![
            CartLine::new(10, 1, Money::from_cents(5000)),
            CartLine::new(11, 1, Money::from_cents(2000)),
            CartLine::new(10, 2, Money::from_cents(5000)),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].product_id, ProductId::new(10));
        assert_eq!(merged[0].quantity, 3);
        assert_eq!(merged[0].unit_price, Money::from_cents(5000));
    }

    #[test]
    fn merge_lines_keeps_distinct_prices_apart() {
        let merged = merge_lines(vec![
            CartLine::new(10, 1, Money::from_cents(5000)),
            CartLine::new(10, 2, Money::from_cents(5500)),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].unit_price, Money::from_cents(5000));
        assert_eq!(merged[1].quantity, 2);
        assert_eq!(merged[1].unit_price, Money::from_cents(5500));
    }

    #[test]
    fn merge_lines_does_not_overflow_quantities() {
        let merged = merge_lines(vec![
            CartLine::new(10, u32::MAX, Money::from_cents(100)),
            CartLine::new(10, 1, Money::from_cents(100)),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn saga_id_is_stable_per_order() {
        type Orch = OrderOrchestrator<
            event_store::InMemoryEventStore,
            crate::services::InMemoryStockLedger,
            crate::services::InMemoryCartProvider,
            crate::services::InMemoryProductCatalog,
        >;
        let order_id = AggregateId::new();
        assert_eq!(Orch::saga_id_for(order_id), Orch::saga_id_for(order_id));
        assert_ne!(Orch::saga_id_for(order_id), order_id);
    }
}
