//! Publish one order payload to the orders topic.
//!
//! # Usage
//!
//! ```bash
//! # From a file
//! cargo run --bin order-ingest-publish -- model.json
//!
//! # From stdin
//! cat model.json | cargo run --bin order-ingest-publish
//! ```
//!
//! `KAFKA_BROKERS` (default `localhost:9092`) and `KAFKA_TOPIC` (default
//! `orders`) select the destination. The payload is sent as-is, so malformed
//! documents can be published to exercise the dead letter path.

use order_ingest_core::Order;
use order_ingest_redpanda::KafkaOrderPublisher;
use std::io::Read;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let payload = match std::env::args().nth(1).filter(|arg| arg != "-") {
        Some(path) => tokio::fs::read(&path).await?,
        None => {
            let mut buffer = Vec::new();
            std::io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };

    // Keyed by order id so every version of an order lands on one partition.
    let key = match Order::from_json(&payload) {
        Ok(order) => order.order_uid,
        Err(e) => {
            warn!(error = %e, "Payload is not a valid order, publishing without a key");
            String::new()
        }
    };

    let brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let topic = std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "orders".to_string());

    let publisher = KafkaOrderPublisher::new(&brokers, topic)?;
    let (partition, offset) = publisher.publish(&key, &payload).await?;

    println!(
        "Published order {key:?} to {}/{partition}@{offset}",
        publisher.topic()
    );
    Ok(())
}
