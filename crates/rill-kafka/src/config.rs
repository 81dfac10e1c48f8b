//! Consumer configuration.
//!
//! [`KafkaConsumerConfig`] covers broker connection and polling, plus
//! pass-through `rdkafka` properties for everything else (security,
//! fetch tuning). Offset commits are disabled: the broker's cursors
//! are the only resumption mechanism, so the Kafka-side committed
//! offsets are never authoritative.

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::ClientConfig;

/// Default poll budget per `read_event` call.
///
/// Kept well below any permitted batch timeout so the engine's
/// per-partition timer check fires within its resolution.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration of a Kafka-backed event consumer.
#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    /// Comma-separated broker list.
    pub bootstrap_servers: String,
    /// Consumer group id reported to the brokers. Group management is
    /// not used (partitions are assigned explicitly), but librdkafka
    /// requires one.
    pub group_id: String,
    /// Poll budget per `read_event` call.
    pub poll_timeout: Duration,
    /// Pass-through librdkafka properties.
    pub properties: HashMap<String, String>,
}

impl KafkaConsumerConfig {
    /// Creates a config with default polling and no extra properties.
    #[must_use]
    pub fn new(bootstrap_servers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            group_id: group_id.into(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            properties: HashMap::new(),
        }
    }

    /// Overrides the poll budget.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Adds a pass-through librdkafka property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builds the rdkafka client configuration.
    #[must_use]
    pub fn to_rdkafka_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false");
        for (key, value) in &self.properties {
            config.set(key, value);
        }
        config
    }
}
