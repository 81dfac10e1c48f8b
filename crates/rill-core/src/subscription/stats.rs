//! Per-event-type live lag projection.
//!
//! The stats endpoint composes the subscription's event types with the
//! current consumer state: for every partition of every consumed event
//! type, the projection reports whether a consumer is attached and how
//! many events it has not yet consumed.

use serde::Serialize;

/// Live consumer positions, as known to the coordination layer.
pub trait ConsumerStateSource: Send + Sync {
    /// Returns the unconsumed-event count for a partition, or `None`
    /// when no consumer is attached to it.
    fn partition_lag(&self, event_type: &str, partition: &str) -> Option<u64>;
}

/// A source reporting no attached consumers; used when the broker runs
/// without the coordination layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConsumerState;

impl ConsumerStateSource for NoConsumerState {
    fn partition_lag(&self, _event_type: &str, _partition: &str) -> Option<u64> {
        None
    }
}

/// Assignment state of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionState {
    /// A consumer of the group is reading the partition.
    Assigned,
    /// No consumer is attached.
    Unassigned,
}

/// Live stats of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    /// Partition identifier.
    pub partition: String,
    /// Assignment state.
    pub state: PartitionState,
    /// Events not yet consumed; absent when unassigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unconsumed_events: Option<u64>,
}

impl PartitionStats {
    /// Stats for a partition with an attached consumer.
    #[must_use]
    pub fn assigned(partition: impl Into<String>, unconsumed_events: u64) -> Self {
        Self {
            partition: partition.into(),
            state: PartitionState::Assigned,
            unconsumed_events: Some(unconsumed_events),
        }
    }

    /// Stats for a partition nobody is reading.
    #[must_use]
    pub fn unassigned(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            state: PartitionState::Unassigned,
            unconsumed_events: None,
        }
    }
}

/// Live stats of one consumed event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionEventTypeStats {
    /// Event-type name.
    pub event_type: String,
    /// Per-partition stats.
    pub partitions: Vec<PartitionStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assigned_serialization() {
        let stats = PartitionStats::assigned("0", 42);
        assert_eq!(
            serde_json::to_string(&stats).unwrap(),
            r#"{"partition":"0","state":"assigned","unconsumed_events":42}"#
        );
    }

    #[test]
    fn test_unassigned_omits_lag() {
        let stats = PartitionStats::unassigned("1");
        assert_eq!(
            serde_json::to_string(&stats).unwrap(),
            r#"{"partition":"1","state":"unassigned"}"#
        );
    }

    #[test]
    fn test_no_consumer_state_reports_nothing() {
        assert_eq!(NoConsumerState.partition_lag("orders", "0"), None);
    }
}
