//! Order ingest service.
//!
//! Consumes orders from Kafka into Postgres and serves them over HTTP from a
//! bounded LRU cache backed by the database.

use order_ingest_core::{DeadLetterQueue, OrderStore};
use order_ingest_postgres::PostgresDeadLetterQueue;
use order_ingest_runtime::metrics::{MetricsServer, register_metrics};
use order_ingest_runtime::{IngestPipeline, OrderCache, OrderReader, replay_pending};
use order_ingest_service::lifecycle::{await_consumer, run_consumer, shutdown_signal};
use order_ingest_service::{Config, acquire_storage};
use order_ingest_web::{AppState, metrics_router, order_router};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_ingest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting order ingest service");

    let config = Config::from_env()?;
    info!(
        brokers = %config.kafka.brokers,
        topic = %config.kafka.topic,
        cache_capacity = config.cache.capacity.get(),
        bind = %config.server.bind_address(),
        "Configuration loaded"
    );

    let metrics = match config.server.metrics_addr {
        Some(addr) => {
            let mut server = MetricsServer::new(addr);
            server.start()?;
            Some(server)
        }
        None => {
            register_metrics();
            None
        }
    };

    // Storage is required: give up after the configured attempts.
    let store = match acquire_storage(&config.postgres).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Could not connect to postgres, exiting");
            return Err(e.into());
        }
    };
    if config.postgres.apply_schema {
        store.apply_schema().await?;
        info!("Schema applied");
    }

    let pool = store.pool().clone();
    let store: Arc<dyn OrderStore> = Arc::new(store);
    let dead_letters: Arc<dyn DeadLetterQueue> = Arc::new(PostgresDeadLetterQueue::new(pool.clone()));
    let cache = Arc::new(OrderCache::new(config.cache.capacity));

    let reader = OrderReader::new(Arc::clone(&store), Arc::clone(&cache));
    if let Err(e) = reader.warm_cache(config.cache.warm_limit).await {
        warn!(error = %e, "Cache warm failed, starting cold");
    }

    let pipeline = IngestPipeline::new(store, cache)
        .with_process_timeout(config.consumer.process_timeout);
    if let Err(e) = replay_pending(
        dead_letters.as_ref(),
        &pipeline,
        config.consumer.dead_letter_replay_limit,
    )
    .await
    {
        warn!(error = %e, "Dead letter replay failed");
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let consumer_handle = tokio::spawn(run_consumer(
        config.kafka.clone(),
        pipeline,
        dead_letters,
        shutdown_tx.subscribe(),
    ));

    let prometheus = metrics
        .as_ref()
        .and_then(|server| server.handle().map(|handle| (server.addr(), handle.clone())));
    let metrics_handle = match prometheus {
        Some((addr, handle)) => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            let mut shutdown_rx = shutdown_tx.subscribe();
            info!(%addr, "Metrics server listening");
            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, metrics_router(handle))
                    .with_graceful_shutdown(async move {
                        let _ = shutdown_rx.recv().await;
                    })
                    .await
                {
                    error!(error = %e, "Metrics server error");
                }
            }))
        }
        None => None,
    };

    let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
    info!(address = %config.server.bind_address(), "HTTP server listening");

    axum::serve(listener, order_router(AppState::new(reader)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, initiating graceful shutdown...");
    let _ = shutdown_tx.send(());

    await_consumer(consumer_handle).await;
    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }
    pool.close().await;

    info!("Graceful shutdown complete");
    Ok(())
}
