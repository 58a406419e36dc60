//! HTTP API server with observability for the marketplace.
//!
//! Provides cart, order and balance endpoints authenticated by a JWT
//! cookie, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::MarketplaceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::TokenVerifier;
use config::Config;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketplaceStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    config: &Config,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let order_routes = Router::new()
        .route(
            "/user/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route(
            "/user/cart/{product_id}/add",
            post(routes::cart::add_item::<S>),
        )
        .route(
            "/user/cart/{product_id}/delete",
            post(routes::cart::remove_item::<S>),
        )
        .route("/user/order/begin", post(routes::orders::begin::<S>))
        .route("/user/order/{order_id}", get(routes::orders::get::<S>));

    let ui_routes = Router::new().route("/balance", get(routes::balance::get::<S>));

    mount(
        mount(Router::new(), &config.order_prefix, order_routes),
        &config.ui_prefix,
        ui_routes,
    )
    .route("/health", get(routes::health::check::<S>))
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

/// Nests `routes` under `prefix`, or merges them when the prefix is empty.
fn mount<T: Clone + Send + Sync + 'static>(
    router: Router<T>,
    prefix: &str,
    routes: Router<T>,
) -> Router<T> {
    if prefix.is_empty() {
        router.merge(routes)
    } else {
        router.nest(prefix, routes)
    }
}

/// Creates the application state over `store` using the configured auth and
/// commission settings.
pub fn create_state<S: MarketplaceStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let tokens = TokenVerifier::new(config.jwt_secret(), config.access_cookie.clone());
    Arc::new(AppState::new(store, tokens, config.commission))
}
