//! The partition consumer port.
//!
//! [`EventConsumer`] is the abstract source the streaming engine drains:
//! a short-blocking `read_event` that yields at most one event per tick,
//! and a `close` releasing the underlying log resources. Two capability
//! extensions cover the concrete variants:
//!
//! - [`LowLevelConsumer`]: fixed assignment, exposes the assigned
//!   partition set
//! - [`ReassignableEventConsumer`]: assignment can be replaced at
//!   runtime, used by subscription-managed streams
//!
//! The engine is generic over the base capability only and never
//! downcasts.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::cursor::EventCursor;
use crate::error::ConsumerError;
use crate::event::{ConsumedEvent, EventTypePartition};
use crate::registry::EventType;

/// Abstract source of events drained from an assigned partition set.
///
/// `read_event` is short-blocking: implementations cap internal blocking
/// with a poll budget well below the engine's batch-timeout resolution,
/// returning `Ok(None)` when nothing arrived this tick.
#[async_trait]
pub trait EventConsumer: Send {
    /// Reads at most one event.
    ///
    /// Returns `Ok(None)` when no event was available within the poll
    /// budget.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError`] on fetch failure or when the consumer
    /// is in an illegal state.
    async fn read_event(&mut self) -> Result<Option<ConsumedEvent>, ConsumerError>;

    /// Releases the underlying log resources.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError`] if teardown fails; callers treat close
    /// failures as non-fatal.
    async fn close(&mut self) -> Result<(), ConsumerError>;
}

#[async_trait]
impl<T: EventConsumer + ?Sized> EventConsumer for Box<T> {
    async fn read_event(&mut self) -> Result<Option<ConsumedEvent>, ConsumerError> {
        (**self).read_event().await
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        (**self).close().await
    }
}

/// A consumer with a fixed partition assignment.
pub trait LowLevelConsumer: EventConsumer {
    /// Returns the set of partitions this consumer is assigned to.
    fn assignment(&self) -> BTreeSet<EventTypePartition>;
}

/// A consumer whose assignment can be replaced at runtime.
///
/// Used by subscription-managed streams when the partition balancer
/// moves partitions between clients of a consumer group.
#[async_trait]
pub trait ReassignableEventConsumer: EventConsumer {
    /// Returns the set of partitions this consumer is assigned to.
    fn assignment(&self) -> BTreeSet<EventTypePartition>;

    /// Replaces the assignment with the partitions named by `cursors`,
    /// positioned after each cursor's offset.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::InvalidCursor`] if a cursor cannot be
    /// mapped onto the backing log, or [`ConsumerError::Upstream`] on
    /// assignment failure.
    async fn reassign(&mut self, cursors: Vec<EventCursor>) -> Result<(), ConsumerError>;
}

/// Creates consumers for the raw consumption endpoint.
///
/// The factory resolves default cursors (all partitions from the
/// beginning) when the client supplied none.
#[async_trait]
pub trait ConsumerFactory: Send + Sync {
    /// Creates a consumer positioned after `cursors`, or at the start of
    /// every partition of `event_type` when `cursors` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError`] when the consumer cannot be created or
    /// a cursor is invalid.
    async fn create_consumer(
        &self,
        event_type: &EventType,
        cursors: Option<Vec<EventCursor>>,
    ) -> Result<Box<dyn EventConsumer>, ConsumerError>;
}
