//! Integration tests for [`KafkaOrderSource`] and [`KafkaOrderPublisher`] with a real
//! Kafka instance.
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they:
//! - Require Docker to be running (for testcontainers)
//! - Take 15-60 seconds per test to spin up Kafka
//!
//! To run explicitly:
//! ```bash
//! cargo test -p order-ingest-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use order_ingest_core::MessageSource;
use order_ingest_redpanda::{GroupIdentity, KafkaOrderPublisher, KafkaOrderSource, probe_brokers};
use order_ingest_testing::fixtures;
use std::time::Duration;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

/// Helper to wait until the broker accepts a publish on `topic`.
async fn wait_for_topic(publisher: &KafkaOrderPublisher) {
    for attempt in 1..=60 {
        if publisher.publish("warmup", b"warmup").await.is_ok() {
            tokio::time::sleep(Duration::from_secs(2)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(attempt != 60, "Kafka failed to become ready");
    }
}

#[tokio::test]
#[ignore]
async fn test_publish_consume_and_commit() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");

    probe_brokers(&brokers, Duration::from_secs(3))
        .await
        .expect("broker port should be open");

    let publisher = KafkaOrderPublisher::new(&brokers, "orders-it").expect("publisher");
    wait_for_topic(&publisher).await;

    let order = fixtures::order("it-order-1");
    publisher
        .publish(&order.order_uid, &fixtures::payload(&order))
        .await
        .expect("publish");

    let source = KafkaOrderSource::builder()
        .brokers(&brokers)
        .topic("orders-it")
        .group(GroupIdentity::Fixed("orders-it-group".to_string()))
        .build()
        .expect("source");

    let received = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let message = source.next_message().await.expect("receive");
            if message.key.as_deref() == Some(order.order_uid.as_bytes()) {
                return message;
            }
        }
    })
    .await
    .expect("order message should arrive");

    assert_eq!(received.topic, "orders-it");
    assert_eq!(received.payload, fixtures::payload(&order));
    source.acknowledge(&received).await.expect("commit");
}
