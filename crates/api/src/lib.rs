//! HTTP surface of the order placement service.
//!
//! Exposes placement, order transitions, payment verification and the
//! internal stock and recovery endpoints. Every response uses the
//! [`ApiResponse`](response::ApiResponse) envelope; access is decided per
//! request by the route table in [`authz`].

pub mod authz;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use authz::AuthzConfig;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    authz: AuthzConfig,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/orders/place/{user_id}", post(routes::orders::place::<S>))
        .route(
            "/api/orders/user/{user_id}",
            get(routes::orders::list_for_user::<S>),
        )
        .route(
            "/api/orders/cancel/{order_id}",
            put(routes::orders::cancel::<S>),
        )
        .route("/api/orders/sagas/{saga_id}", get(routes::orders::saga::<S>))
        .route("/api/orders/{order_id}", get(routes::orders::get::<S>))
        .route(
            "/api/orders/{order_id}/payment-status",
            put(routes::orders::update_payment_status::<S>),
        )
        .route(
            "/api/orders/{order_id}/status",
            put(routes::orders::update_status::<S>),
        )
        .route("/api/payment/create", post(routes::payment::create::<S>))
        .route("/api/payment/verify", post(routes::payment::verify::<S>))
        .route(
            "/internal/products/{product_id}",
            put(routes::internal::upsert_product::<S>),
        )
        .route(
            "/internal/products/{product_id}/stock",
            get(routes::internal::stock::<S>),
        )
        .route(
            "/internal/products/{product_id}/reserve",
            post(routes::internal::reserve::<S>),
        )
        .route(
            "/internal/products/{product_id}/confirm",
            post(routes::internal::confirm::<S>),
        )
        .route(
            "/internal/products/{product_id}/release",
            post(routes::internal::release::<S>),
        )
        .route(
            "/internal/carts/{user_id}",
            put(routes::internal::set_cart::<S>),
        )
        .route("/internal/reconcile", post(routes::internal::reconcile::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(middleware::from_fn_with_state(authz, authz::authorize))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Runs the recovery sweep every `interval` until `shutdown` resolves.
pub async fn run_reconciler<S, F>(state: Arc<AppState<S>>, interval: Duration, shutdown: F)
where
    S: EventStore + Clone + 'static,
    F: std::future::Future<Output = ()> + Send,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {
                match state.orchestrator.recover_incomplete().await {
                    Ok(report) if !report.errors.is_empty() => {
                        tracing::warn!(errors = ?report.errors, "recovery sweep left errors");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "recovery sweep failed"),
                }
            }
        }
    }
    tracing::info!("reconciler stopped");
}
