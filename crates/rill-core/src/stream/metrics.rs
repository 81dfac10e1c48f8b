//! Per-stream counters.
//!
//! Shared between the engine and the framer via `Arc`; the server keeps
//! one instance per process and aggregates across connections.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters advanced by the streaming engine and the framer.
#[derive(Debug, Default)]
pub struct StreamMetrics {
    /// Total bytes flushed to client sinks.
    pub bytes_flushed: AtomicU64,

    /// Total batch records emitted (keep-alives included).
    pub batches_emitted: AtomicU64,

    /// Batch records emitted with no events.
    pub keep_alives_emitted: AtomicU64,

    /// Events written across all batch records.
    pub events_streamed: AtomicU64,
}

impl StreamMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one emitted record of `bytes` length carrying
    /// `event_count` events.
    pub fn record_batch(&self, bytes: u64, event_count: u64) {
        self.bytes_flushed.fetch_add(bytes, Ordering::Relaxed);
        self.batches_emitted.fetch_add(1, Ordering::Relaxed);
        if event_count == 0 {
            self.keep_alives_emitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_streamed.fetch_add(event_count, Ordering::Relaxed);
        }
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StreamMetricsSnapshot {
        StreamMetricsSnapshot {
            bytes_flushed: self.bytes_flushed.load(Ordering::Relaxed),
            batches_emitted: self.batches_emitted.load(Ordering::Relaxed),
            keep_alives_emitted: self.keep_alives_emitted.load(Ordering::Relaxed),
            events_streamed: self.events_streamed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`StreamMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamMetricsSnapshot {
    /// Total bytes flushed to client sinks.
    pub bytes_flushed: u64,
    /// Total batch records emitted.
    pub batches_emitted: u64,
    /// Keep-alive records emitted.
    pub keep_alives_emitted: u64,
    /// Events written across all records.
    pub events_streamed: u64,
}
