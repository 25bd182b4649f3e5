//! Bare TCP reachability probe for brokers.
//!
//! The probe only proves that something accepts connections on the broker
//! address; protocol-level readiness is left to the Kafka client.

use order_ingest_core::SourceError;
use std::time::Duration;
use tokio::net::TcpStream;

/// Default timeout for a single connection attempt.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Open (and immediately drop) a TCP connection to `address`.
///
/// # Errors
///
/// Returns [`SourceError::Connection`] if the connection is refused, the address
/// does not resolve or the attempt exceeds `timeout`.
pub async fn probe_broker(address: &str, timeout: Duration) -> Result<(), SourceError> {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(SourceError::Connection(format!("{address}: {e}"))),
        Err(_) => Err(SourceError::Connection(format!(
            "{address}: timed out after {timeout:?}"
        ))),
    }
}

/// Probe each broker of a comma-separated list until one answers.
///
/// # Errors
///
/// Returns the last broker's error if none is reachable, or
/// [`SourceError::Connection`] if the list is empty.
pub async fn probe_brokers(brokers: &str, timeout: Duration) -> Result<(), SourceError> {
    let mut last_error = SourceError::Connection("no brokers configured".to_string());
    for address in brokers.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        match probe_broker(address, timeout).await {
            Ok(()) => {
                tracing::debug!(broker = address, "Broker reachable");
                return Ok(());
            }
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}
