//! Integration tests for the order placement saga and order transitions.

use std::time::Duration;

use common::{AggregateId, ErrorKind};
use domain::{
    DomainError, DomainEvent, Money, OrderError, OrderStatus, PaymentStatus, ProductId, UserId,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};
use saga::{
    CartLine, InMemoryCartProvider, InMemoryProductCatalog, InMemoryStockLedger, LedgerOp,
    OrchestratorConfig, OrderOrchestrator, RequestedItem, ReservationEntry, ReservationKey,
    RetryPolicy, SagaError, SagaEvent, SagaInstance, SagaState, StockLedger,
};

type TestOrchestrator = OrderOrchestrator<
    InMemoryEventStore,
    InMemoryStockLedger,
    InMemoryCartProvider,
    InMemoryProductCatalog,
>;

const USER: i64 = 1;

struct TestHarness {
    orchestrator: TestOrchestrator,
    store: InMemoryEventStore,
    ledger: InMemoryStockLedger,
    carts: InMemoryCartProvider,
    catalog: InMemoryProductCatalog,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_config(OrchestratorConfig {
            call_timeout: Duration::from_secs(1),
            compensation_retry: RetryPolicy::new(1, Duration::from_millis(1)),
        })
        .await
    }

    async fn with_config(config: OrchestratorConfig) -> Self {
        let store = InMemoryEventStore::new();
        let ledger = InMemoryStockLedger::new();
        let carts = InMemoryCartProvider::new();
        let catalog = InMemoryProductCatalog::new();

        ledger.add_product(10, 5).await;
        ledger.add_product(11, 3).await;
        catalog.insert(10, "Kettle").await;
        catalog.insert(11, "Teapot").await;
        carts.set_cart(USER, standard_cart()).await;

        let orchestrator = OrderOrchestrator::with_config(
            store.clone(),
            ledger.clone(),
            carts.clone(),
            catalog.clone(),
            config,
        );

        Self {
            orchestrator,
            store,
            ledger,
            carts,
            catalog,
        }
    }

    async fn reserved(&self, product: i64) -> u32 {
        self.ledger
            .stock_level(ProductId::new(product))
            .await
            .unwrap()
            .reserved
    }

    async fn only_saga(&self) -> SagaInstance {
        let ids = self
            .store
            .aggregate_ids_by_type("OrderPlacementSaga")
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
        self.orchestrator.get_saga(ids[0]).await.unwrap()
    }
}

fn standard_cart() -> Vec<CartLine> {
    vec![
        CartLine::new(10, 2, "50.00".parse().unwrap()),
        CartLine::new(11, 1, "20.00".parse().unwrap()),
    ]
}

fn key(order_id: AggregateId, product: i64) -> ReservationKey {
    ReservationKey::new(order_id, ProductId::new(product))
}

mod placement {
    use super::*;

    #[tokio::test]
    async fn test_happy_path_reserves_persists_and_clears_cart() {
        let h = TestHarness::new().await;

        let view = h.orchestrator.place_order(UserId::new(USER)).await.unwrap();

        assert_eq!(view.order_status, OrderStatus::Created);
        assert_eq!(view.payment_status, PaymentStatus::Pending);
        assert_eq!(view.total_amount.to_string(), "120.00");
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].product_name.as_deref(), Some("Kettle"));
        assert_eq!(view.items[0].total_price, Money::from_cents(10000));

        assert_eq!(h.reserved(10).await, 2);
        assert_eq!(h.reserved(11).await, 1);
        assert_eq!(h.carts.item_count(USER).await, 0);

        let saga = h.only_saga().await;
        assert_eq!(saga.state(), SagaState::Completed);
        assert_eq!(saga.order_id(), Some(view.order_id));
        assert!(saga.order_created() && saga.cart_cleared());
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_without_a_saga() {
        let h = TestHarness::new().await;
        h.carts.set_cart(USER, vec![]).await;

        let err = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::EmptyCart(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_releases_what_was_reserved() {
        let h = TestHarness::new().await;
        h.carts
            .set_cart(
                USER,
                vec![
                    CartLine::new(10, 2, Money::from_cents(5000)),
                    CartLine::new(11, 4, Money::from_cents(2000)),
                ],
            )
            .await;

        let err = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap_err();

        let SagaError::OrderPlacementFailed {
            source,
            compensation,
        } = &err
        else {
            panic!("expected OrderPlacementFailed, got {err:?}");
        };
        assert!(matches!(
            **source,
            SagaError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }
        ));
        assert!(compensation.is_complete());
        assert_eq!(compensation.released, vec![ProductId::new(10)]);

        assert_eq!(h.reserved(10).await, 0);
        assert_eq!(h.reserved(11).await, 0);
        assert_eq!(h.carts.item_count(USER).await, 2);
        assert!(
            h.orchestrator
                .orders_for_user(UserId::new(USER))
                .await
                .unwrap()
                .is_empty()
        );

        let saga = h.only_saga().await;
        assert_eq!(saga.state(), SagaState::Failed);
        assert_eq!(saga.failed_step(), Some("reserve_stock"));
        assert!(!saga.has_compensation_failure());
    }

    #[tokio::test]
    async fn test_failure_in_the_middle_of_five_lines_releases_the_rest() {
        let h = TestHarness::new().await;
        for product in 20..25 {
            h.ledger.add_product(product, 10).await;
        }
        h.carts
            .set_cart(
                USER,
                vec![
                    CartLine::new(20, 1, Money::from_cents(1000)),
                    CartLine::new(21, 2, Money::from_cents(1000)),
                    CartLine::new(22, 11, Money::from_cents(1000)),
                    CartLine::new(23, 3, Money::from_cents(1000)),
                    CartLine::new(24, 4, Money::from_cents(1000)),
                ],
            )
            .await;

        let err = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap_err();

        let SagaError::OrderPlacementFailed {
            source,
            compensation,
        } = &err
        else {
            panic!("expected OrderPlacementFailed, got {err:?}");
        };
        assert!(matches!(**source, SagaError::InsufficientStock { .. }));
        assert!(compensation.is_complete());
        let mut released = compensation.released.clone();
        released.sort();
        assert_eq!(
            released,
            [20, 21, 23, 24].map(ProductId::new).to_vec()
        );

        for product in 20..25 {
            assert_eq!(h.reserved(product).await, 0, "product {product}");
        }
        assert!(
            h.orchestrator
                .orders_for_user(UserId::new(USER))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(h.carts.item_count(USER).await, 5);

        let saga = h.only_saga().await;
        assert_eq!(saga.state(), SagaState::Failed);
        assert_eq!(saga.failed_step(), Some("reserve_stock"));
        assert!(saga.pending_releases().is_empty());
    }

    #[tokio::test]
    async fn test_same_product_at_two_prices_is_charged_per_line() {
        let h = TestHarness::new().await;
        h.carts
            .set_cart(
                USER,
                vec![
                    CartLine::new(10, 1, "50.00".parse().unwrap()),
                    CartLine::new(10, 2, "55.00".parse().unwrap()),
                ],
            )
            .await;

        let view = h.orchestrator.place_order(UserId::new(USER)).await.unwrap();

        assert_eq!(view.total_amount.to_string(), "160.00");
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[1].total_price, Money::from_cents(11000));
        assert_eq!(h.reserved(10).await, 3);

        h.orchestrator
            .update_payment_status(view.order_id, PaymentStatus::Paid)
            .await
            .unwrap();
        let stock = h.ledger.stock_level(ProductId::new(10)).await.unwrap();
        assert_eq!((stock.total, stock.reserved), (2, 0));
    }

    #[tokio::test]
    async fn test_overflowing_amount_is_compensated() {
        let h = TestHarness::new().await;
        h.ledger.add_product(10, 500).await;
        h.carts
            .set_cart(
                USER,
                vec![CartLine::new(10, 200, Money::from_cents(i64::MAX / 100))],
            )
            .await;

        let err = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        let SagaError::OrderPlacementFailed { source, .. } = &err else {
            panic!("expected OrderPlacementFailed, got {err:?}");
        };
        assert!(matches!(
            **source,
            SagaError::Domain(DomainError::Order(OrderError::AmountOverflow))
        ));
        assert_eq!(h.reserved(10).await, 0);

        let saga = h.only_saga().await;
        assert_eq!(saga.state(), SagaState::Failed);
        assert_eq!(saga.failed_step(), Some("create_order"));
        assert!(!saga.has_compensation_failure());
    }

    #[tokio::test]
    async fn test_overflowing_quantities_are_rejected_before_reserving() {
        let h = TestHarness::new().await;
        h.carts
            .set_cart(
                USER,
                vec![
                    CartLine::new(10, u32::MAX, Money::from_cents(100)),
                    CartLine::new(10, 1, Money::from_cents(200)),
                ],
            )
            .await;

        let err = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SagaError::Domain(DomainError::Order(OrderError::QuantityOverflow { .. }))
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.store.event_count().await, 0);
        assert_eq!(h.reserved(10).await, 0);
    }

    #[tokio::test]
    async fn test_compensation_failure_keeps_the_original_error() {
        let h = TestHarness::new().await;
        h.ledger.set_fail_on_reserve(11, true).await;
        h.ledger.set_fail_on_release(true);

        let err = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap_err();

        assert!(matches!(err.root_cause(), SagaError::Ledger(msg) if msg.contains("reserve")));
        let SagaError::OrderPlacementFailed { compensation, .. } = &err else {
            panic!("expected OrderPlacementFailed, got {err:?}");
        };
        assert!(!compensation.is_complete());
        assert_eq!(h.reserved(10).await, 2);

        let saga = h.only_saga().await;
        assert_eq!(saga.state(), SagaState::Failed);
        assert!(saga.has_compensation_failure());

        // The sweep picks the stuck release up once the ledger recovers.
        h.ledger.set_fail_on_release(false);
        let report = h.orchestrator.recover_incomplete().await.unwrap();

        assert_eq!(report.still_pending, 0);
        assert!(report.errors.is_empty());
        assert_eq!(h.reserved(10).await, 0);
        assert!(!h.only_saga().await.has_compensation_failure());
    }

    #[tokio::test]
    async fn test_cart_clear_failure_voids_the_order() {
        let h = TestHarness::new().await;
        h.carts.set_fail_on_clear(true);

        let err = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap_err();

        assert!(matches!(
            err.root_cause(),
            SagaError::Downstream { service: "cart", .. }
        ));
        assert_eq!(h.reserved(10).await, 0);
        assert_eq!(h.reserved(11).await, 0);

        let saga = h.only_saga().await;
        assert!(saga.order_voided());
        assert_eq!(saga.failed_step(), Some("clear_cart"));

        let order_id = saga.order_id().unwrap();
        let order = h.orchestrator.get_order(order_id).await.unwrap();
        assert_eq!(order.order_status, OrderStatus::Cancelled);
        assert!(order.closing_reason.unwrap().contains("Placement failed"));
    }

    #[tokio::test]
    async fn test_reserve_timeout_releases_and_blocks_late_reservations() {
        let h = TestHarness::with_config(OrchestratorConfig {
            call_timeout: Duration::from_millis(20),
            compensation_retry: RetryPolicy::new(1, Duration::from_millis(1)),
        })
        .await;
        h.ledger
            .set_reserve_delay(Some(Duration::from_millis(200)))
            .await;

        let err = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap_err();
        assert!(matches!(err.root_cause(), SagaError::Timeout { .. }));

        let order_id = h.only_saga().await.order_id().unwrap();
        assert_eq!(
            h.ledger.reservation(key(order_id, 10)).await,
            Some(ReservationEntry::Released(0))
        );

        h.ledger.set_reserve_delay(None).await;
        assert!(matches!(
            h.ledger.reserve(key(order_id, 10), 2).await,
            Err(SagaError::ReservationSettled { .. })
        ));
    }

    #[tokio::test]
    async fn test_caller_giving_up_does_not_stop_the_saga() {
        let h = TestHarness::new().await;
        h.ledger
            .set_reserve_delay(Some(Duration::from_millis(50)))
            .await;

        let gave_up = tokio::time::timeout(
            Duration::from_millis(5),
            h.orchestrator.place_order(UserId::new(USER)),
        )
        .await;
        assert!(gave_up.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let orders = h
            .orchestrator
            .orders_for_user(UserId::new(USER))
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(h.only_saga().await.state(), SagaState::Completed);
    }

    #[tokio::test]
    async fn test_names_degrade_when_catalog_is_down() {
        let h = TestHarness::new().await;
        h.catalog.set_unavailable(true);

        let view = h.orchestrator.place_order(UserId::new(USER)).await.unwrap();

        assert!(view.items.iter().all(|i| i.product_name.is_none()));
        assert_eq!(view.total_amount, Money::from_cents(12000));
    }
}

mod payment_outcomes {
    use super::*;

    #[tokio::test]
    async fn test_paid_confirms_each_item_once() {
        let h = TestHarness::new().await;
        let order_id = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap()
            .order_id;

        let view = h
            .orchestrator
            .update_payment_status(order_id, PaymentStatus::Paid)
            .await
            .unwrap();
        assert_eq!(view.order_status, OrderStatus::Confirmed);
        assert_eq!(view.payment_status, PaymentStatus::Paid);

        let err = h
            .orchestrator
            .update_payment_status(order_id, PaymentStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::PaymentAlreadyProcessed { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        for product in [10, 11] {
            assert_eq!(
                h.ledger
                    .applied_count(LedgerOp::Confirm, key(order_id, product))
                    .await,
                1
            );
        }
        let level = h.ledger.stock_level(ProductId::new(10)).await.unwrap();
        assert_eq!((level.total, level.reserved), (3, 0));
    }

    #[tokio::test]
    async fn test_failed_payment_releases_each_item_once() {
        let h = TestHarness::new().await;
        let order_id = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap()
            .order_id;

        let view = h
            .orchestrator
            .update_payment_status(order_id, PaymentStatus::Failed)
            .await
            .unwrap();
        assert_eq!(view.order_status, OrderStatus::Cancelled);
        assert_eq!(view.payment_status, PaymentStatus::Failed);
        assert!(
            h.orchestrator
                .update_payment_status(order_id, PaymentStatus::Failed)
                .await
                .is_err()
        );

        for product in [10, 11] {
            assert_eq!(
                h.ledger
                    .applied_count(LedgerOp::Release, key(order_id, product))
                    .await,
                1
            );
            assert_eq!(h.reserved(product).await, 0);
        }
    }

    #[tokio::test]
    async fn test_pending_is_not_a_payment_outcome() {
        let h = TestHarness::new().await;
        let order_id = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap()
            .order_id;

        let err = h
            .orchestrator
            .update_payment_status(order_id, PaymentStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::InvalidPaymentStatus(_)));
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let h = TestHarness::new().await;
        let err = h
            .orchestrator
            .update_payment_status(AggregateId::new(), PaymentStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::OrderNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

mod order_transitions {
    use super::*;

    #[tokio::test]
    async fn test_cancel_releases_stock_once() {
        let h = TestHarness::new().await;
        let order_id = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap()
            .order_id;

        let view = h.orchestrator.cancel_order(order_id).await.unwrap();
        assert_eq!(view.order_status, OrderStatus::Cancelled);
        assert_eq!(view.payment_status, PaymentStatus::Pending);
        assert_eq!(h.reserved(10).await, 0);

        let err = h.orchestrator.cancel_order(order_id).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::InvalidStateTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Cancelled
            }
        ));
        assert!(matches!(
            h.orchestrator
                .update_payment_status(order_id, PaymentStatus::Paid)
                .await,
            Err(SagaError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_paid_orders_cannot_be_cancelled() {
        let h = TestHarness::new().await;
        let order_id = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap()
            .order_id;
        h.orchestrator
            .update_payment_status(order_id, PaymentStatus::Paid)
            .await
            .unwrap();

        assert!(matches!(
            h.orchestrator.cancel_order(order_id).await,
            Err(SagaError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_fulfilment_path_and_terminal_states() {
        let h = TestHarness::new().await;
        let order_id = h
            .orchestrator
            .place_order(UserId::new(USER))
            .await
            .unwrap()
            .order_id;

        assert!(matches!(
            h.orchestrator
                .update_order_status(order_id, OrderStatus::Shipped)
                .await,
            Err(SagaError::InvalidStateTransition { .. })
        ));

        h.orchestrator
            .update_payment_status(order_id, PaymentStatus::Paid)
            .await
            .unwrap();
        h.orchestrator
            .update_order_status(order_id, OrderStatus::Shipped)
            .await
            .unwrap();
        let view = h
            .orchestrator
            .update_order_status(order_id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(view.order_status, OrderStatus::Delivered);

        for target in [
            OrderStatus::Created,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            assert!(
                h.orchestrator
                    .update_order_status(order_id, target)
                    .await
                    .is_err()
            );
        }
    }

    #[tokio::test]
    async fn test_orders_listed_per_user() {
        let h = TestHarness::new().await;
        let first = h.orchestrator.place_order(UserId::new(USER)).await.unwrap();
        h.carts.set_cart(USER, standard_cart()).await;
        let second = h.orchestrator.place_order(UserId::new(USER)).await.unwrap();

        let orders = h
            .orchestrator
            .orders_for_user(UserId::new(USER))
            .await
            .unwrap();
        let ids: Vec<_> = orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![first.order_id, second.order_id]);
        assert!(
            h.orchestrator
                .orders_for_user(UserId::new(2))
                .await
                .unwrap()
                .is_empty()
        );
    }
}

mod recovery {
    use super::*;

    /// Writes a saga log as a crashed process would have left it.
    async fn write_saga_log(store: &InMemoryEventStore, saga_id: AggregateId, events: Vec<SagaEvent>) {
        let envelopes = events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                EventEnvelope::builder()
                    .aggregate_id(saga_id)
                    .aggregate_type("OrderPlacementSaga")
                    .event_type(event.event_type())
                    .version(Version::new(i as i64 + 1))
                    .payload(event)
                    .unwrap()
                    .build()
                    .unwrap()
            })
            .collect();
        store
            .append(envelopes, AppendOptions::expect_new())
            .await
            .unwrap();
    }

    fn requested() -> Vec<RequestedItem> {
        vec![
            RequestedItem {
                product_id: ProductId::new(10),
                quantity: 2,
            },
            RequestedItem {
                product_id: ProductId::new(11),
                quantity: 1,
            },
        ]
    }

    #[tokio::test]
    async fn test_crash_before_order_is_rolled_back() {
        let h = TestHarness::new().await;
        let order_id = AggregateId::new();
        let saga_id = TestOrchestrator::saga_id_for(order_id);

        // Crashed after one reservation landed and before the second was logged.
        h.ledger.reserve(key(order_id, 10), 2).await.unwrap();
        write_saga_log(
            &h.store,
            saga_id,
            vec![
                SagaEvent::saga_started(saga_id, order_id, UserId::new(USER), "OrderPlacement"),
                SagaEvent::reservation_requested(requested()),
                SagaEvent::item_reserved(ProductId::new(10), 2),
            ],
        )
        .await;

        let report = h.orchestrator.recover_incomplete().await.unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.compensated, 1);
        assert_eq!(h.reserved(10).await, 0);
        assert_eq!(
            h.ledger.reservation(key(order_id, 11)).await,
            Some(ReservationEntry::Released(0))
        );
        let saga = h.orchestrator.get_saga(saga_id).await.unwrap();
        assert_eq!(saga.state(), SagaState::Failed);
        assert_eq!(h.carts.item_count(USER).await, 2);
    }

    #[tokio::test]
    async fn test_crash_after_order_is_rolled_forward() {
        let h = TestHarness::new().await;
        let order_id = AggregateId::new();
        let saga_id = TestOrchestrator::saga_id_for(order_id);

        h.ledger.reserve(key(order_id, 10), 2).await.unwrap();
        h.ledger.reserve(key(order_id, 11), 1).await.unwrap();
        domain::OrderStore::new(h.store.clone())
            .place_order(
                order_id,
                UserId::new(USER),
                vec![
                    domain::OrderItem::new(10, 2, Money::from_cents(5000)),
                    domain::OrderItem::new(11, 1, Money::from_cents(2000)),
                ],
            )
            .await
            .unwrap();
        write_saga_log(
            &h.store,
            saga_id,
            vec![
                SagaEvent::saga_started(saga_id, order_id, UserId::new(USER), "OrderPlacement"),
                SagaEvent::reservation_requested(requested()),
                SagaEvent::item_reserved(ProductId::new(10), 2),
                SagaEvent::item_reserved(ProductId::new(11), 1),
            ],
        )
        .await;

        let report = h.orchestrator.recover_incomplete().await.unwrap();

        assert_eq!(report.rolled_forward, 1);
        assert_eq!(h.carts.item_count(USER).await, 0);
        assert_eq!(h.reserved(10).await, 2);
        let saga = h.orchestrator.get_saga(saga_id).await.unwrap();
        assert_eq!(saga.state(), SagaState::Completed);

        let again = h.orchestrator.recover_incomplete().await.unwrap();
        assert_eq!(again.rolled_forward + again.compensated, 0);
    }

    #[tokio::test]
    async fn test_unknown_saga_is_not_found() {
        let h = TestHarness::new().await;
        assert!(matches!(
            h.orchestrator.get_saga(AggregateId::new()).await,
            Err(SagaError::SagaNotFound(_))
        ));
    }
}
