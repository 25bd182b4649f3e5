//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the process is serving HTTP. It does NOT check
/// the database or the broker.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness body: the state of the order cache.
#[derive(Debug, Serialize)]
pub struct Readiness {
    /// Always `"ready"` once the router is serving.
    pub status: &'static str,
    /// Orders currently cached.
    pub cache_len: usize,
    /// Maximum number of cached orders.
    pub cache_capacity: usize,
}

/// Readiness endpoint.
///
/// The router is only mounted after storage is acquired and the cache warmed,
/// so answering at all means the read path is usable.
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
///
/// # Response
///
/// ```json
/// { "status": "ready", "cache_len": 42, "cache_capacity": 100 }
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness(State(state): State<AppState>) -> Json<Readiness> {
    let cache = state.reader().cache();
    Json(Readiness {
        status: "ready",
        cache_len: cache.len(),
        cache_capacity: cache.capacity(),
    })
}
