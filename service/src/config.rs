//! Configuration management for the order ingest service.
//!
//! Every setting comes from an environment variable with a default, except the
//! database URL which has none. Parsing goes through a lookup function so it can
//! be exercised without touching the process environment.

use order_ingest_redpanda::GroupIdentity;
use order_ingest_runtime::RetryPolicy;
use std::env;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value {value:?} for {key}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` configuration
    pub postgres: PostgresConfig,
    /// Kafka/Redpanda configuration
    pub kafka: KafkaConfig,
    /// Order cache configuration
    pub cache: CacheConfig,
    /// Ingestion consumer configuration
    pub consumer: ConsumerConfig,
    /// HTTP server configuration
    pub server: ServerConfig,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Connection URL (`DATABASE_URL`, falling back to `DSN`)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection attempts before startup fails
    pub connect_attempts: usize,
    /// Pause between connection attempts
    pub connect_delay: Duration,
    /// Apply `schema.sql` after connecting
    pub apply_schema: bool,
}

impl PostgresConfig {
    /// Retry policy for acquiring the pool.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::bounded(self.connect_attempts, self.connect_delay)
    }
}

/// Kafka/Redpanda configuration
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// Topic carrying orders
    pub topic: String,
    /// Fixed consumer group; unset means a fresh time-derived group per start
    pub consumer_group: Option<String>,
    /// Start position for a group without committed offsets
    pub auto_offset_reset: String,
    /// Pause between broker reachability probes
    pub probe_delay: Duration,
}

impl KafkaConfig {
    /// Consumer group identity derived from [`consumer_group`](Self::consumer_group).
    #[must_use]
    pub fn group_identity(&self) -> GroupIdentity {
        GroupIdentity::from_config(self.consumer_group.as_deref())
    }
}

/// Order cache configuration
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum number of cached orders
    pub capacity: NonZeroUsize,
    /// Recent orders loaded at startup
    pub warm_limit: usize,
}

/// Ingestion consumer configuration
#[derive(Debug, Clone, Copy)]
pub struct ConsumerConfig {
    /// Deadline for persisting and re-reading one order
    pub process_timeout: Duration,
    /// Pending dead letters replayed at startup
    pub dead_letter_replay_limit: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Prometheus scrape address; unset disables the exporter
    pub metrics_addr: Option<SocketAddr>,
}

impl ServerConfig {
    /// `host:port` for the API listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the database URL is missing or a value fails to
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let url = var("DATABASE_URL")
            .or_else(|| var("DSN"))
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            postgres: PostgresConfig {
                url,
                max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
                connect_attempts: parse_or(&var, "DATABASE_CONNECT_ATTEMPTS", 5)?,
                connect_delay: secs_or(&var, "DATABASE_CONNECT_DELAY_SECS", 2)?,
                apply_schema: parse_or(&var, "DATABASE_APPLY_SCHEMA", false)?,
            },
            kafka: KafkaConfig {
                brokers: var("KAFKA_BROKERS").unwrap_or_else(|| "kafka:9092".to_string()),
                topic: var("KAFKA_TOPIC").unwrap_or_else(|| "orders".to_string()),
                consumer_group: var("KAFKA_CONSUMER_GROUP"),
                auto_offset_reset: var("KAFKA_AUTO_OFFSET_RESET")
                    .unwrap_or_else(|| "earliest".to_string()),
                probe_delay: secs_or(&var, "KAFKA_PROBE_DELAY_SECS", 3)?,
            },
            cache: CacheConfig {
                capacity: parse_or(
                    &var,
                    "CACHE_CAPACITY",
                    order_ingest_runtime::cache::DEFAULT_CAPACITY,
                )?,
                warm_limit: parse_or(&var, "CACHE_WARM_LIMIT", 100)?,
            },
            consumer: ConsumerConfig {
                process_timeout: secs_or(&var, "CONSUMER_PROCESS_TIMEOUT_SECS", 30)?,
                dead_letter_replay_limit: parse_or(&var, "DEAD_LETTER_REPLAY_LIMIT", 100)?,
            },
            server: ServerConfig {
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&var, "PORT", 8081)?,
                metrics_addr: var("METRICS_ADDR")
                    .map(|value| parse("METRICS_ADDR", value))
                    .transpose()?,
            },
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    var(key).map_or(Ok(default), |value| parse(key, value))
}

fn secs_or(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    parse_or(var, key, default).map(Duration::from_secs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/orders")]).unwrap();

        assert_eq!(config.postgres.max_connections, 10);
        assert_eq!(config.postgres.connect_attempts, 5);
        assert_eq!(config.postgres.connect_delay, Duration::from_secs(2));
        assert!(!config.postgres.apply_schema);
        assert_eq!(config.kafka.brokers, "kafka:9092");
        assert_eq!(config.kafka.topic, "orders");
        assert_eq!(config.kafka.consumer_group, None);
        assert_eq!(config.kafka.auto_offset_reset, "earliest");
        assert_eq!(config.kafka.probe_delay, Duration::from_secs(3));
        assert_eq!(config.cache.capacity.get(), 100);
        assert_eq!(config.cache.warm_limit, 100);
        assert_eq!(config.consumer.process_timeout, Duration::from_secs(30));
        assert_eq!(config.consumer.dead_letter_replay_limit, 100);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8081");
        assert_eq!(config.server.metrics_addr, None);
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        assert_eq!(
            load(&[("DATABASE_URL", "  ")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
    }

    #[test]
    fn dsn_is_accepted() {
        let config = load(&[("DSN", "postgres://db/orders")]).unwrap();
        assert_eq!(config.postgres.url, "postgres://db/orders");
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/orders"),
            ("DATABASE_CONNECT_ATTEMPTS", "3"),
            ("DATABASE_APPLY_SCHEMA", "true"),
            ("KAFKA_BROKERS", "a:9092,b:9092"),
            ("KAFKA_CONSUMER_GROUP", "orders-service"),
            ("CACHE_CAPACITY", "2"),
            ("PORT", "9000"),
            ("METRICS_ADDR", "127.0.0.1:9090"),
        ])
        .unwrap();

        assert_eq!(config.postgres.retry_policy(), RetryPolicy::bounded(3, Duration::from_secs(2)));
        assert!(config.postgres.apply_schema);
        assert_eq!(config.kafka.brokers, "a:9092,b:9092");
        assert_eq!(
            config.kafka.group_identity(),
            GroupIdentity::Fixed("orders-service".to_string())
        );
        assert_eq!(config.cache.capacity.get(), 2);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.metrics_addr, Some("127.0.0.1:9090".parse().unwrap()));
    }

    #[test]
    fn unset_group_is_ephemeral() {
        let config = load(&[("DATABASE_URL", "postgres://db/orders")]).unwrap();
        assert!(!config.kafka.group_identity().is_durable());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = load(&[("DATABASE_URL", "postgres://db"), ("CACHE_CAPACITY", "0")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "CACHE_CAPACITY",
                value: "0".to_string()
            }
        );

        let err = load(&[("DATABASE_URL", "postgres://db"), ("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }
}
