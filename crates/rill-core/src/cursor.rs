//! Wire-level and storage-level cursors.
//!
//! [`EventCursor`] is the broker's internal position: event type,
//! partition, and a storage-native offset token. [`Cursor`] is the
//! wire view exposed to clients in batch records; it drops the event
//! type and keeps partition and offset as opaque strings.
//!
//! Offsets are never compared or parsed by the streaming layer; the
//! backing log is the only authority on their ordering.

use serde::{Deserialize, Serialize};

/// Offset token positioning a partition at its first event.
///
/// Interpreted by the backing-log adapters; the streaming layer treats
/// it as opaque like any other token.
pub const BEGIN_OFFSET: &str = "begin";

/// A client-facing resumption token: `(partition, offset)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    /// Partition identifier.
    pub partition: String,
    /// Opaque offset token within the partition.
    pub offset: String,
}

impl Cursor {
    /// Creates a new wire cursor.
    #[must_use]
    pub fn new(partition: impl Into<String>, offset: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            offset: offset.into(),
        }
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.partition, self.offset)
    }
}

/// The broker-internal position of an event: `(event_type, partition, offset)`.
///
/// Ordering of offsets is total within a partition and undefined across
/// partitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventCursor {
    /// Name of the event type this position belongs to.
    pub event_type: String,
    /// Partition identifier within the event type.
    pub partition: String,
    /// Storage-native opaque offset token.
    pub offset: String,
}

impl EventCursor {
    /// Creates a new internal cursor.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        partition: impl Into<String>,
        offset: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            partition: partition.into(),
            offset: offset.into(),
        }
    }

    /// Projects the wire view of this position.
    #[must_use]
    pub fn wire(&self) -> Cursor {
        Cursor::new(self.partition.clone(), self.offset.clone())
    }
}

impl std::fmt::Display for EventCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.event_type, self.partition, self.offset)
    }
}
