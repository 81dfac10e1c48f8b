//! The per-connection streaming engine.
//!
//! One [`EventStream`](engine::EventStream) per HTTP connection drains a
//! partition consumer, assembles per-partition batches, and frames them
//! as newline-delimited records under batch-size, batch-timeout,
//! stream-limit, stream-timeout, and keep-alive constraints.

/// Immutable per-connection stream parameters.
pub mod config;

/// The streaming loop.
pub mod engine;

/// Newline-delimited batch record framing.
pub mod framer;

/// Per-stream counters.
pub mod metrics;

pub use config::{StreamConfig, StreamConfigBuilder, StreamConfigError};
pub use engine::EventStream;
pub use metrics::{StreamMetrics, StreamMetricsSnapshot};
