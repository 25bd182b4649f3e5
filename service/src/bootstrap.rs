//! Startup acquisition of the database pool and the broker.
//!
//! Storage gets a bounded number of attempts and failing it is fatal. The broker
//! is waited for indefinitely, because the HTTP read path is useful without it.

use crate::config::{KafkaConfig, PostgresConfig};
use order_ingest_core::{ConnectionError, SourceError, StoreError};
use order_ingest_postgres::PostgresOrderStore;
use order_ingest_redpanda::probe::{DEFAULT_PROBE_TIMEOUT, probe_brokers};
use order_ingest_runtime::retry::retry;
use order_ingest_runtime::{RetryExhausted, RetryPolicy};
use std::fmt;
use std::future::Future;
use tracing::{debug, info};

/// Connect to `PostgreSQL` using the configured attempts and delay.
///
/// # Errors
///
/// Returns [`ConnectionError`] once every attempt has failed.
pub async fn acquire_storage(config: &PostgresConfig) -> Result<PostgresOrderStore, ConnectionError> {
    acquire_storage_with(&config.retry_policy(), || {
        PostgresOrderStore::connect(&config.url, config.max_connections)
    })
    .await
}

/// Run `connect` under `policy` until it yields a store.
///
/// # Errors
///
/// Returns [`ConnectionError`] carrying the attempt count and the last error.
pub async fn acquire_storage_with<S, F, Fut>(
    policy: &RetryPolicy,
    mut connect: F,
) -> Result<S, ConnectionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, StoreError>>,
{
    let store = retry(policy, "postgres connect", |attempt| {
        debug!(attempt, "Connecting to postgres");
        connect()
    })
    .await
    .map_err(|e| connection_error("postgres", e))?;

    info!("Connected to postgres");
    Ok(store)
}

/// Block until one of the configured brokers accepts a TCP connection.
///
/// Probes repeat every `probe_delay` with no attempt limit.
///
/// # Errors
///
/// Never returns an error with an unbounded policy; the signature mirrors
/// [`wait_for_broker_with`].
pub async fn wait_for_broker(config: &KafkaConfig) -> Result<(), ConnectionError> {
    wait_for_broker_with(&RetryPolicy::unbounded(config.probe_delay), || {
        probe_brokers(&config.brokers, DEFAULT_PROBE_TIMEOUT)
    })
    .await
}

/// Run `probe` under `policy` until it succeeds.
///
/// # Errors
///
/// Returns [`ConnectionError`] if a bounded policy runs out of attempts.
pub async fn wait_for_broker_with<F, Fut>(
    policy: &RetryPolicy,
    mut probe: F,
) -> Result<(), ConnectionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), SourceError>>,
{
    retry(policy, "broker probe", |_| probe())
        .await
        .map_err(|e| connection_error("kafka", e))?;

    info!("Broker reachable");
    Ok(())
}

fn connection_error<E: fmt::Display>(resource: &str, exhausted: RetryExhausted<E>) -> ConnectionError {
    ConnectionError {
        resource: resource.to_string(),
        attempts: exhausted.attempts,
        last_error: exhausted.last_error.to_string(),
    }
}
