//! HTTP API server with observability for the cart and checkout system.
//!
//! Provides REST endpoints for cart mutation, checkout and catalog seeding,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use checkout::CheckoutCoordinator;
use domain::{CartLocks, CartService, RetryPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CartRepository, ProductCatalog};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<C, R>
where
    C: ProductCatalog,
    R: CartRepository,
{
    pub cart_service: CartService<C, R>,
    pub checkout: CheckoutCoordinator<C, R>,
    pub catalog: C,
}

impl<C, R> AppState<C, R>
where
    C: ProductCatalog + Clone,
    R: CartRepository + Clone,
{
    /// Wires the cart service and checkout coordinator over shared stores.
    ///
    /// Both share one lock registry so that mutations and checkout of the
    /// same owner's cart never interleave.
    pub fn new(catalog: C, carts: R, retry: RetryPolicy) -> Self {
        let locks = CartLocks::new();
        let cart_service = CartService::new(catalog.clone(), carts.clone())
            .with_locks(locks.clone())
            .with_retry_policy(retry);
        let checkout = CheckoutCoordinator::new(catalog.clone(), carts).with_locks(locks);

        Self {
            cart_service,
            checkout,
            catalog,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<C, R>(state: Arc<AppState<C, R>>, metrics_handle: PrometheusHandle) -> Router
where
    C: ProductCatalog + 'static,
    R: CartRepository + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart/add-to-cart", post(routes::cart::add::<C, R>))
        .route("/cart/remove-from-cart", patch(routes::cart::remove::<C, R>))
        .route("/cart/checkout/{cart_id}", post(routes::cart::checkout::<C, R>))
        .route("/cart/{user_id}", get(routes::cart::get::<C, R>))
        .route("/products", post(routes::products::upsert::<C, R>))
        .route("/products/{id}", get(routes::products::get::<C, R>))
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
