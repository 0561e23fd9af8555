//! HTTP API server with observability for the checkout core.
//!
//! Exposes the cart, quote, and payment-webhook endpoints over the checkout
//! services, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use checkout::{CheckoutPricer, PaymentConfirmation, ReservationManager};
use store::CommerceStore;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CommerceStore> {
    pub manager: ReservationManager<S>,
    pub pricer: CheckoutPricer<S>,
    pub confirmation: PaymentConfirmation<S>,
    pub store: S,
}

/// Builds the application state from a store backend and configuration.
pub fn create_state<S: CommerceStore>(store: S, config: &Config) -> Arc<AppState<S>> {
    let manager = ReservationManager::new(
        store.clone(),
        config.hold_window(),
        config.session_ttl(),
    );
    let pricer = CheckoutPricer::new(
        store.clone(),
        config.currency_config(),
        config.default_shipping_key.clone(),
    );
    let confirmation = PaymentConfirmation::new(store.clone(), config.hold_window());

    Arc::new(AppState {
        manager,
        pricer,
        confirmation,
        store,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CommerceStore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::get_cart::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route("/cart/items/{sku}", delete(routes::cart::remove_item::<S>))
        .route("/checkout/quote", post(routes::quote::quote::<S>))
        .route("/webhooks/payment", post(routes::webhook::payment::<S>))
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
