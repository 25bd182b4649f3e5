//! HTTP routers.
//!
//! # Routes
//!
//! - `GET /order/:order_uid` - order lookup (cache, then store)
//! - `GET /health` - liveness
//! - `GET /ready` - readiness with cache occupancy
//!
//! The Prometheus scrape endpoint lives on its own router so it can be served
//! on a separate address.

use crate::handlers;
use crate::state::AppState;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

/// Build the public API router.
///
/// # Example
///
/// ```rust,ignore
/// let reader = OrderReader::new(store, cache);
/// let app = order_router(AppState::new(reader));
/// axum::serve(listener, app).await?;
/// ```
pub fn order_router(state: AppState) -> Router {
    Router::new()
        .route("/order", get(handlers::missing_order_id))
        .route("/order/", get(handlers::missing_order_id))
        .route("/order/:order_uid", get(handlers::get_order))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Build the `/metrics` router over an installed Prometheus recorder.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}
