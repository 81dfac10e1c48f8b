//! Consumed events and partition identities.

use serde::{Deserialize, Serialize};

use crate::cursor::EventCursor;

/// An event drained from a partition, paired with its position.
///
/// The `event` field holds already-serialized JSON text and is written
/// verbatim to the wire; the broker never re-serializes payloads.
///
/// Invariant: `position.partition` is the partition the event was
/// drained from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedEvent {
    /// Raw JSON text of the event.
    pub event: String,
    /// Position at which the event was read.
    pub position: EventCursor,
}

impl ConsumedEvent {
    /// Creates a new consumed event.
    #[must_use]
    pub fn new(event: impl Into<String>, position: EventCursor) -> Self {
        Self {
            event: event.into(),
            position,
        }
    }
}

/// An `(event_type, partition)` pair identifying one shard of a log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventTypePartition {
    /// Name of the event type.
    pub event_type: String,
    /// Partition identifier.
    pub partition: String,
}

impl EventTypePartition {
    /// Creates a new event-type partition identity.
    #[must_use]
    pub fn new(event_type: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            partition: partition.into(),
        }
    }
}

impl std::fmt::Display for EventTypePartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.event_type, self.partition)
    }
}
