//! Prometheus metrics for ingestion and the order cache.
//!
//! Metrics are recorded through the `metrics` facade; with no recorder installed
//! they are no-ops, so library code records unconditionally.
//!
//! # Example
//!
//! ```rust,no_run
//! use order_ingest_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint is served on.
///
/// The recorder is installed process-wide; rendering is left to the HTTP layer,
/// which mounts [`render`](Self::render) at `/metrics`.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should listen on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder that
    /// is already installed (e.g. by another test) is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics recorder installed - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Ingestion
    describe_counter!(
        "orders_ingested_total",
        "Total number of orders persisted and cached, by the consumer or dead letter replay"
    );
    describe_counter!(
        "orders_rejected_total",
        "Total number of messages that failed processing, labelled by reason"
    );
    describe_counter!(
        "orders_dead_lettered_total",
        "Total number of failed messages recorded in the dead letter queue"
    );
    describe_histogram!(
        "orders_ingest_duration_seconds",
        "Time taken to decode, persist and cache one order"
    );

    // Cache
    describe_counter!("orders_cache_hits_total", "Total number of cache hits");
    describe_counter!("orders_cache_misses_total", "Total number of cache misses");
    describe_counter!(
        "orders_cache_evictions_total",
        "Total number of orders evicted from the cache"
    );
    describe_gauge!("orders_cache_size", "Number of orders currently cached");
}

/// Ingestion metrics recorder.
pub struct IngestMetrics;

impl IngestMetrics {
    /// Record a fully processed message.
    pub fn record_ingested(duration: Duration) {
        counter!("orders_ingested_total").increment(1);
        histogram!("orders_ingest_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed message.
    pub fn record_rejected(reason: &'static str) {
        counter!("orders_rejected_total", "reason" => reason).increment(1);
    }

    /// Record a dead-letter entry.
    pub fn record_dead_lettered() {
        counter!("orders_dead_lettered_total").increment(1);
    }
}

/// Cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a cache hit.
    pub fn record_hit() {
        counter!("orders_cache_hits_total").increment(1);
    }

    /// Record a cache miss.
    pub fn record_miss() {
        counter!("orders_cache_misses_total").increment(1);
    }

    /// Record an eviction.
    pub fn record_eviction() {
        counter!("orders_cache_evictions_total").increment(1);
    }

    /// Record the current number of cached orders.
    #[allow(clippy::cast_precision_loss)] // Cache sizes are far below 2^52
    pub fn record_size(len: usize) {
        gauge!("orders_cache_size").set(len as f64);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert_eq!(server.addr(), addr);
    }

    #[test]
    fn metrics_server_render() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        IngestMetrics::record_ingested(Duration::from_millis(5));
        IngestMetrics::record_rejected("validation");
        CacheMetrics::record_hit();

        // Another test may have installed the recorder first; metrics are still
        // recorded globally in that case.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("orders_ingested_total"));
            assert!(rendered.contains("orders_rejected_total"));
            assert!(rendered.contains("orders_cache_hits_total"));
        }
    }
}
