//! # Rill Kafka
//!
//! Kafka-backed implementation of the Rill partition-consumer port.
//!
//! Each event type maps to one Kafka topic; a [`KafkaEventConsumer`]
//! is assigned the exact topic partitions named by the stream's
//! cursors and positioned immediately after each cursor's offset.
//! Offsets travel as opaque string tokens on the wire; this crate is
//! the only place they are parsed.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Consumer configuration.
pub mod config;

/// The rdkafka-backed consumer.
pub mod consumer;

/// Consumer factory for the raw consumption endpoint.
pub mod factory;

pub use config::KafkaConsumerConfig;
pub use consumer::KafkaEventConsumer;
pub use factory::KafkaConsumerFactory;
