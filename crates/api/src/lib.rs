//! HTTP API server with observability for the order-fulfillment core.
//!
//! Provides REST endpoints for checkout, payment confirmation, order
//! lifecycle, and the stock/rewards read models, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{CheckoutService, ConfirmationService, InMemoryNotifier, InMemoryPaymentGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::CommerceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CommerceStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::orders::checkout::<S>))
        .route("/webhooks/payment", post(routes::webhooks::payment_confirmed::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", post(routes::orders::advance_status::<S>))
        .route("/customers/{id}/orders", get(routes::orders::list_for_customer::<S>))
        .route("/customers/{id}/rewards", get(routes::rewards::get::<S>))
        .route("/variants", get(routes::variants::list::<S>))
        .route("/variants/{id}", get(routes::variants::get::<S>))
        .route("/variants/{id}/ledger", get(routes::variants::ledger::<S>))
        .route("/admin/inventory/adjust", post(routes::variants::adjust::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state with in-memory gateway and
/// notifier fakes around the given store.
pub fn create_default_state<S: CommerceStore + 'static>(store: Arc<S>) -> Arc<AppState<S>> {
    let gateway = Arc::new(InMemoryPaymentGateway::new());
    let notifier = Arc::new(InMemoryNotifier::new());

    let checkout = CheckoutService::new(store.clone(), gateway, notifier.clone());
    let confirmations = ConfirmationService::new(store.clone(), notifier);

    Arc::new(AppState {
        store,
        checkout,
        confirmations,
    })
}
