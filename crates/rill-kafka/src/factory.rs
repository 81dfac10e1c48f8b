//! Consumer factory for the raw consumption endpoint.

use async_trait::async_trait;

use rill_core::consumer::{ConsumerFactory, EventConsumer};
use rill_core::cursor::{EventCursor, BEGIN_OFFSET};
use rill_core::error::ConsumerError;
use rill_core::registry::EventType;

use crate::config::KafkaConsumerConfig;
use crate::consumer::KafkaEventConsumer;

/// Hands out Kafka consumers positioned by the client's cursors, or at
/// the start of every partition when the client supplied none.
#[derive(Debug, Clone)]
pub struct KafkaConsumerFactory {
    config: KafkaConsumerConfig,
}

impl KafkaConsumerFactory {
    /// Creates a factory sharing one consumer configuration.
    #[must_use]
    pub fn new(config: KafkaConsumerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConsumerFactory for KafkaConsumerFactory {
    async fn create_consumer(
        &self,
        event_type: &EventType,
        cursors: Option<Vec<EventCursor>>,
    ) -> Result<Box<dyn EventConsumer>, ConsumerError> {
        let cursors = cursors.unwrap_or_else(|| {
            event_type
                .partitions
                .iter()
                .map(|partition| EventCursor::new(&event_type.name, partition, BEGIN_OFFSET))
                .collect()
        });
        let consumer = KafkaEventConsumer::connect(self.config.clone(), &cursors)?;
        Ok(Box::new(consumer))
    }
}
