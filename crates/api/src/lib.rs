//! HTTP API server with observability for the commerce engine.
//!
//! Provides REST endpoints for carts, checkout, payment webhooks and orders,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::Money;
use domain::Product;
use engine::{Engine, EngineConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::PaymentProvider;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S, P: ?Sized> {
    pub engine: Engine<S, P>,
}

impl<S, P> AppState<S, P>
where
    S: Store + Clone,
    P: PaymentProvider + ?Sized,
{
    pub fn new(store: S, provider: Arc<P>, config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(store, provider, config),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, P>(state: Arc<AppState<S, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: Store + Clone + 'static,
    P: PaymentProvider + ?Sized + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S, P>))
        .route("/cart", get(routes::cart::view::<S, P>))
        .route("/cart/items", post(routes::cart::add_item::<S, P>))
        .route("/cart/checkout", post(routes::cart::checkout::<S, P>))
        .route("/payments/webhook", post(routes::payments::webhook::<S, P>))
        .route("/orders", get(routes::orders::list::<S, P>))
        .route("/orders/{id}", get(routes::orders::get::<S, P>))
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

/// Products seeded into the in-memory store for local runs.
pub fn demo_catalog() -> Vec<Product> {
    vec![
        Product::new("SKU-001", "Widget", Money::from_cents(1000), 5),
        Product::new("SKU-002", "Gadget", Money::from_cents(2500), 20),
        Product::new("SKU-003", "Gizmo", Money::from_cents(499), 100),
    ]
}
