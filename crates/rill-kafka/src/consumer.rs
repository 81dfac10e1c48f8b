//! The rdkafka-backed consumer.
//!
//! Implements the partition-consumer port over a `StreamConsumer` with
//! an explicit assignment derived from the stream's cursors. A cursor
//! offset is the last-consumed position, so the assignment seeks to
//! offset + 1 (next-to-fetch, per Kafka convention); the token
//! [`BEGIN_OFFSET`] seeks to the start of the partition.

use std::collections::BTreeSet;

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info};

use rill_core::consumer::{EventConsumer, ReassignableEventConsumer};
use rill_core::cursor::{EventCursor, BEGIN_OFFSET};
use rill_core::error::ConsumerError;
use rill_core::event::{ConsumedEvent, EventTypePartition};

use crate::config::KafkaConsumerConfig;

/// A consumer assigned the exact partitions named by its cursors.
pub struct KafkaEventConsumer {
    consumer: Option<StreamConsumer>,
    config: KafkaConsumerConfig,
    assignment: BTreeSet<EventTypePartition>,
}

impl KafkaEventConsumer {
    /// Creates a consumer and assigns it the partitions named by
    /// `cursors`, positioned after each cursor's offset.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Upstream`] when the consumer cannot be
    /// created or assigned, or [`ConsumerError::InvalidCursor`] when a
    /// cursor cannot be mapped onto the log.
    pub fn connect(
        config: KafkaConsumerConfig,
        cursors: &[EventCursor],
    ) -> Result<Self, ConsumerError> {
        let consumer: StreamConsumer = config
            .to_rdkafka_config()
            .create()
            .map_err(|e| ConsumerError::Upstream(format!("failed to create consumer: {e}")))?;

        let tpl = partition_list(cursors)?;
        consumer
            .assign(&tpl)
            .map_err(|e| ConsumerError::Upstream(format!("failed to assign partitions: {e}")))?;

        info!(
            brokers = %config.bootstrap_servers,
            partitions = cursors.len(),
            "assigned Kafka consumer"
        );

        Ok(Self {
            consumer: Some(consumer),
            config,
            assignment: cursors
                .iter()
                .map(|c| EventTypePartition::new(c.event_type.clone(), c.partition.clone()))
                .collect(),
        })
    }
}

#[async_trait]
impl EventConsumer for KafkaEventConsumer {
    async fn read_event(&mut self) -> Result<Option<ConsumedEvent>, ConsumerError> {
        let consumer = self.consumer.as_ref().ok_or(ConsumerError::Closed)?;

        match tokio::time::timeout(self.config.poll_timeout, consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(ConsumerError::Upstream(e.to_string())),
            Ok(Ok(message)) => {
                let payload = message.payload().unwrap_or_default();
                let event = std::str::from_utf8(payload)
                    .map_err(|e| {
                        ConsumerError::Malformed(format!(
                            "event at {}/{}@{} is not UTF-8: {e}",
                            message.topic(),
                            message.partition(),
                            message.offset()
                        ))
                    })?
                    .to_string();

                let position = EventCursor::new(
                    message.topic(),
                    message.partition().to_string(),
                    message.offset().to_string(),
                );
                Ok(Some(ConsumedEvent::new(event, position)))
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            debug!("closed Kafka consumer");
        }
        Ok(())
    }
}

#[async_trait]
impl ReassignableEventConsumer for KafkaEventConsumer {
    fn assignment(&self) -> BTreeSet<EventTypePartition> {
        self.assignment.clone()
    }

    async fn reassign(&mut self, cursors: Vec<EventCursor>) -> Result<(), ConsumerError> {
        let consumer = self.consumer.as_ref().ok_or(ConsumerError::Closed)?;
        let tpl = partition_list(&cursors)?;
        consumer
            .assign(&tpl)
            .map_err(|e| ConsumerError::Upstream(format!("failed to reassign partitions: {e}")))?;

        self.assignment = cursors
            .iter()
            .map(|c| EventTypePartition::new(c.event_type.clone(), c.partition.clone()))
            .collect();
        debug!(partitions = cursors.len(), "reassigned Kafka consumer");
        Ok(())
    }
}

/// Builds the assignment list for `cursors`.
fn partition_list(cursors: &[EventCursor]) -> Result<TopicPartitionList, ConsumerError> {
    let mut tpl = TopicPartitionList::new();
    for cursor in cursors {
        let partition: i32 = cursor.partition.parse().map_err(|_| {
            ConsumerError::InvalidCursor(format!(
                "partition '{}' is not a Kafka partition number",
                cursor.partition
            ))
        })?;
        let offset = parse_offset_token(&cursor.offset)?;
        tpl.add_partition_offset(&cursor.event_type, partition, offset)
            .map_err(|e| ConsumerError::InvalidCursor(e.to_string()))?;
    }
    Ok(tpl)
}

/// Maps a cursor offset token to a Kafka seek position.
///
/// The token is the last-consumed offset, so numeric tokens seek to
/// the following offset.
fn parse_offset_token(token: &str) -> Result<Offset, ConsumerError> {
    if token.eq_ignore_ascii_case(BEGIN_OFFSET) {
        return Ok(Offset::Beginning);
    }
    token
        .parse::<i64>()
        .map(|last_consumed| Offset::Offset(last_consumed + 1))
        .map_err(|_| {
            ConsumerError::InvalidCursor(format!("offset '{token}' is not a Kafka offset"))
        })
}
