//! Immutable per-connection stream parameters.
//!
//! Built once at request start from query parameters and the client's
//! cursors, then handed to the engine. The builder validates the
//! combinations the engine is not prepared to handle: a zero batch
//! timeout would flush on every iteration, so it is rejected here.

use std::time::Duration;

use thiserror::Error;

use crate::cursor::EventCursor;

/// Default number of events per batch.
pub const DEFAULT_BATCH_LIMIT: usize = 1;

/// Default per-partition flush timeout.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Invalid stream parameter combinations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamConfigError {
    /// `batch_timeout` must be strictly positive.
    #[error("batch_flush_timeout must be greater than zero")]
    ZeroBatchTimeout,

    /// `batch_limit` must be at least one event.
    #[error("batch_limit must be at least 1")]
    ZeroBatchLimit,

    /// A stream needs at least one starting cursor.
    #[error("at least one cursor is required")]
    NoCursors,
}

/// Immutable parameters of one streaming connection.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Event type being consumed.
    pub event_type: String,
    /// Client-declared consuming application identity.
    pub consuming_app: String,
    /// Starting position for every assigned partition.
    pub cursors: Vec<EventCursor>,
    /// Maximum events per emitted batch record.
    pub batch_limit: usize,
    /// Per-partition flush deadline; also the heartbeat interval.
    pub batch_timeout: Duration,
    /// Total events after which the stream ends. Zero means unlimited.
    pub stream_limit: usize,
    /// Wall-clock bound on the whole stream. Zero means unlimited.
    pub stream_timeout: Duration,
    /// Consecutive keep-alive flushes per partition after which the
    /// stream ends. Zero means unlimited.
    pub stream_keep_alive_limit: usize,
}

impl StreamConfig {
    /// Starts building a config for one event type and consumer.
    #[must_use]
    pub fn builder(
        event_type: impl Into<String>,
        consuming_app: impl Into<String>,
    ) -> StreamConfigBuilder {
        StreamConfigBuilder {
            event_type: event_type.into(),
            consuming_app: consuming_app.into(),
            cursors: Vec::new(),
            batch_limit: DEFAULT_BATCH_LIMIT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            stream_limit: 0,
            stream_timeout: Duration::ZERO,
            stream_keep_alive_limit: 0,
        }
    }
}

/// Builder for [`StreamConfig`].
#[derive(Debug)]
pub struct StreamConfigBuilder {
    event_type: String,
    consuming_app: String,
    cursors: Vec<EventCursor>,
    batch_limit: usize,
    batch_timeout: Duration,
    stream_limit: usize,
    stream_timeout: Duration,
    stream_keep_alive_limit: usize,
}

impl StreamConfigBuilder {
    /// Sets the starting cursors, one per assigned partition.
    #[must_use]
    pub fn cursors(mut self, cursors: Vec<EventCursor>) -> Self {
        self.cursors = cursors;
        self
    }

    /// Sets the maximum events per batch record.
    #[must_use]
    pub fn batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Sets the per-partition flush timeout.
    #[must_use]
    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Sets the total event limit. Zero means unlimited.
    #[must_use]
    pub fn stream_limit(mut self, limit: usize) -> Self {
        self.stream_limit = limit;
        self
    }

    /// Sets the stream wall-clock bound. Zero means unlimited.
    #[must_use]
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Sets the consecutive keep-alive bound. Zero means unlimited.
    #[must_use]
    pub fn stream_keep_alive_limit(mut self, limit: usize) -> Self {
        self.stream_keep_alive_limit = limit;
        self
    }

    /// Validates and builds the config.
    ///
    /// # Errors
    ///
    /// Returns [`StreamConfigError`] on a zero batch timeout, a zero
    /// batch limit, or an empty cursor set.
    pub fn build(self) -> Result<StreamConfig, StreamConfigError> {
        if self.batch_timeout.is_zero() {
            return Err(StreamConfigError::ZeroBatchTimeout);
        }
        if self.batch_limit == 0 {
            return Err(StreamConfigError::ZeroBatchLimit);
        }
        if self.cursors.is_empty() {
            return Err(StreamConfigError::NoCursors);
        }
        Ok(StreamConfig {
            event_type: self.event_type,
            consuming_app: self.consuming_app,
            cursors: self.cursors,
            batch_limit: self.batch_limit,
            batch_timeout: self.batch_timeout,
            stream_limit: self.stream_limit,
            stream_timeout: self.stream_timeout,
            stream_keep_alive_limit: self.stream_keep_alive_limit,
        })
    }
}
