//! The streaming loop.
//!
//! One [`EventStream`] per connection. Each iteration makes one read
//! attempt against the consumer, runs a per-partition flush pass, and
//! checks the termination conditions:
//!
//! 1. connection no longer ready, or consumption blacklisted (no drain)
//! 2. every partition hit the keep-alive limit (no drain; all
//!    partitions just emitted a keep-alive)
//! 3. stream timeout or stream limit reached (pending non-empty
//!    batches are drained first)
//!
//! By the time the loop starts, response headers are already on the
//! wire, so failures never propagate out of [`EventStream::run`]: sink
//! and consumer errors are logged, the loop stops, and the consumer is
//! closed on every exit path.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::blacklist::ConsumptionBlacklist;
use crate::consumer::EventConsumer;
use crate::cursor::Cursor;
use crate::error::ConsumerError;
use crate::features::{Feature, FeatureGates};
use crate::stream::config::StreamConfig;
use crate::stream::framer;
use crate::stream::metrics::StreamMetrics;

/// Why the loop stopped writing. Never escapes `run`.
enum StreamFault {
    Sink(io::Error),
    Consumer(ConsumerError),
}

/// Per-partition loop state, built once from the starting cursors.
struct PartitionProgress {
    /// Most recently observed position; keep-alives report it.
    latest: crate::cursor::EventCursor,
    /// Events accumulated since the last flush.
    batch: Vec<String>,
    /// Consecutive flushes that carried no events.
    keep_alives_in_a_row: usize,
    /// When the current batch was started.
    batch_started: Instant,
}

/// The per-connection streaming engine.
///
/// Owns its consumer and its byte sink exclusively for the duration of
/// the loop; the consumer is closed on every exit path.
pub struct EventStream<C, W> {
    consumer: C,
    sink: W,
    config: StreamConfig,
    blacklist: Arc<dyn ConsumptionBlacklist>,
    gates: Arc<dyn FeatureGates>,
    metrics: Arc<StreamMetrics>,
}

impl<C, W> EventStream<C, W>
where
    C: EventConsumer,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates an engine over a consumer and a byte sink.
    pub fn new(
        consumer: C,
        sink: W,
        config: StreamConfig,
        blacklist: Arc<dyn ConsumptionBlacklist>,
        gates: Arc<dyn FeatureGates>,
        metrics: Arc<StreamMetrics>,
    ) -> Self {
        Self {
            consumer,
            sink,
            config,
            blacklist,
            gates,
            metrics,
        }
    }

    /// Runs the loop until a termination condition fires or the client
    /// disconnects, then closes the consumer.
    ///
    /// `connection_ready` flipping to `false` is observed at the top of
    /// the next iteration and exits promptly without a final flush.
    pub async fn run(mut self, connection_ready: Arc<AtomicBool>) {
        match self.stream_loop(&connection_ready).await {
            Ok(()) => {}
            Err(StreamFault::Sink(e)) => {
                info!(
                    error = %e,
                    "I/O error while streaming events (possibly client closed connection)"
                );
            }
            Err(StreamFault::Consumer(
                e @ (ConsumerError::IllegalState(_) | ConsumerError::Closed),
            )) => {
                info!(error = %e, "consumer left streamable state, terminating stream");
            }
            Err(StreamFault::Consumer(e)) => {
                error!(
                    event_type = %self.config.event_type,
                    consuming_app = %self.config.consuming_app,
                    error = %e,
                    "error polling events from the backing log"
                );
            }
        }

        if let Err(e) = self.consumer.close().await {
            warn!(error = %e, "failed to close event consumer");
        }
    }

    async fn stream_loop(&mut self, connection_ready: &AtomicBool) -> Result<(), StreamFault> {
        // Dense per-partition state keyed by the partitions assigned at
        // request start; the flush pass iterates this captured order.
        let partitions: Vec<String> = self
            .config
            .cursors
            .iter()
            .map(|c| c.partition.clone())
            .collect();

        let start = Instant::now();
        let mut progress: HashMap<String, PartitionProgress> = self
            .config
            .cursors
            .iter()
            .map(|c| {
                (
                    c.partition.clone(),
                    PartitionProgress {
                        latest: c.clone(),
                        batch: Vec::new(),
                        keep_alives_in_a_row: 0,
                        batch_started: start,
                    },
                )
            })
            .collect();

        let mut messages_read: usize = 0;

        while connection_ready.load(Ordering::Acquire)
            && !self
                .blacklist
                .is_consumption_blocked(&self.config.event_type, &self.config.consuming_app)
        {
            if let Some(event) = self
                .consumer
                .read_event()
                .await
                .map_err(StreamFault::Consumer)?
            {
                let Some(state) = progress.get_mut(&event.position.partition) else {
                    // The consumer contract guarantees events only from
                    // assigned partitions.
                    return Err(StreamFault::Consumer(ConsumerError::IllegalState(
                        format!(
                            "event from unassigned partition {}",
                            event.position.partition
                        ),
                    )));
                };
                state.batch.push(event.event);
                state.latest = event.position;
                state.keep_alives_in_a_row = 0;
                messages_read += 1;
            }

            for partition in &partitions {
                let Some(state) = progress.get_mut(partition) else {
                    continue;
                };
                let due = state.batch_started.elapsed() >= self.config.batch_timeout;
                let full = state.batch.len() >= self.config.batch_limit;
                if !(due || full) {
                    continue;
                }

                let cursor = state.latest.wire();
                let was_keep_alive = state.batch.is_empty();
                self.send_batch(&cursor, &state.batch).await?;

                if was_keep_alive {
                    state.keep_alives_in_a_row += 1;
                }
                state.batch.clear();
                state.batch_started = Instant::now();
            }

            if self.config.stream_keep_alive_limit != 0 {
                let limit_reached_everywhere = progress
                    .values()
                    .all(|state| state.keep_alives_in_a_row >= self.config.stream_keep_alive_limit);
                if limit_reached_everywhere {
                    break;
                }
            }

            let timed_out = !self.config.stream_timeout.is_zero()
                && start.elapsed() >= self.config.stream_timeout;
            let limit_hit =
                self.config.stream_limit != 0 && messages_read >= self.config.stream_limit;
            if timed_out || limit_hit {
                for partition in &partitions {
                    let Some(state) = progress.get(partition) else {
                        continue;
                    };
                    if !state.batch.is_empty() {
                        let cursor = state.latest.wire();
                        self.send_batch(&cursor, &state.batch).await?;
                    }
                }
                break;
            }
        }

        Ok(())
    }

    /// Emits one record for `cursor` and `events` (empty events means a
    /// keep-alive) and advances the counters by the record length.
    #[allow(clippy::cast_possible_truncation)] // record lengths fit in u64
    async fn send_batch(&mut self, cursor: &Cursor, events: &[String]) -> Result<(), StreamFault> {
        let written = if self.gates.is_enabled(Feature::SendBatchViaOutputStream) {
            framer::write_batch(&mut self.sink, cursor, events)
                .await
                .map_err(StreamFault::Sink)?
        } else {
            let record = framer::render_batch(cursor, events);
            self.sink
                .write_all(record.as_bytes())
                .await
                .map_err(StreamFault::Sink)?;
            self.sink.flush().await.map_err(StreamFault::Sink)?;
            record.len()
        };

        self.metrics
            .record_batch(written as u64, events.len() as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::blacklist::InMemoryBlacklist;
    use crate::cursor::EventCursor;
    use crate::features::InMemoryFeatureGates;
    use crate::testing::{CollectSink, ScriptedConsumer, Tick};

    struct Harness {
        blacklist: Arc<InMemoryBlacklist>,
        gates: Arc<InMemoryFeatureGates>,
        metrics: Arc<StreamMetrics>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                blacklist: Arc::new(InMemoryBlacklist::new()),
                gates: Arc::new(InMemoryFeatureGates::new()),
                metrics: Arc::new(StreamMetrics::new()),
            }
        }

        async fn run(
            &self,
            consumer: ScriptedConsumer,
            config: StreamConfig,
        ) -> Vec<u8> {
            let mut sink = CollectSink::new();
            let engine = EventStream::new(
                consumer,
                &mut sink,
                config,
                self.blacklist.clone(),
                self.gates.clone(),
                self.metrics.clone(),
            );
            engine.run(Arc::new(AtomicBool::new(true))).await;
            sink.into_bytes()
        }
    }

    fn config_one_partition() -> crate::stream::config::StreamConfigBuilder {
        StreamConfig::builder("orders", "app-1")
            .cursors(vec![EventCursor::new("orders", "0", "000")])
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_sequence_then_close() {
        let harness = Harness::new();
        let config = config_one_partition()
            .batch_timeout(Duration::from_secs(1))
            .stream_keep_alive_limit(2)
            .build()
            .unwrap();

        let body = harness.run(ScriptedConsumer::empty(), config).await;

        assert_eq!(
            String::from_utf8(body).unwrap(),
            "{\"cursor\":{\"partition\":\"0\",\"offset\":\"000\"}}\n\
             {\"cursor\":{\"partition\":\"0\",\"offset\":\"000\"}}\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_full_batch() {
        let harness = Harness::new();
        let config = config_one_partition()
            .batch_limit(3)
            .batch_timeout(Duration::from_secs(30))
            .stream_limit(3)
            .build()
            .unwrap();

        let consumer = ScriptedConsumer::from_ticks(vec![
            Tick::event("orders", "0", "001", r#"{"a":1}"#),
            Tick::event("orders", "0", "002", r#"{"a":2}"#),
            Tick::event("orders", "0", "003", r#"{"a":3}"#),
        ]);
        let body = harness.run(consumer, config).await;

        assert_eq!(
            String::from_utf8(body).unwrap(),
            "{\"cursor\":{\"partition\":\"0\",\"offset\":\"003\"},\"events\":[{\"a\":1},{\"a\":2},{\"a\":3}]}\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_limit_cutoff_with_final_flush() {
        let harness = Harness::new();
        let config = config_one_partition()
            .batch_limit(10)
            .batch_timeout(Duration::from_secs(30))
            .stream_limit(2)
            .build()
            .unwrap();

        let consumer = ScriptedConsumer::from_ticks(vec![
            Tick::event("orders", "0", "001", r#"{"a":1}"#),
            Tick::event("orders", "0", "002", r#"{"a":2}"#),
            Tick::event("orders", "0", "003", r#"{"a":3}"#),
            Tick::event("orders", "0", "004", r#"{"a":4}"#),
        ]);
        let body = harness.run(consumer, config).await;

        // Exactly two events total, flushed on the limit exit.
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "{\"cursor\":{\"partition\":\"0\",\"offset\":\"002\"},\"events\":[{\"a\":1},{\"a\":2}]}\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_limit_never_exceeded() {
        let harness = Harness::new();
        let config = config_one_partition()
            .batch_limit(2)
            .batch_timeout(Duration::from_secs(30))
            .stream_limit(5)
            .build()
            .unwrap();

        let consumer = ScriptedConsumer::from_ticks(
            (1..=5)
                .map(|i| Tick::event("orders", "0", format!("{i:03}"), format!(r#"{{"n":{i}}}"#)))
                .collect(),
        );
        let body = harness.run(consumer, config).await;
        let text = String::from_utf8(body).unwrap();

        for line in text.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            if let Some(events) = value.get("events") {
                assert!(events.as_array().unwrap().len() <= 2);
            }
        }
        let total: usize = text
            .lines()
            .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
            .filter_map(|v| v.get("events").and_then(|e| e.as_array().map(Vec::len)))
            .sum();
        assert_eq!(total, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_resets_keep_alive_counter() {
        let harness = Harness::new();
        let config = config_one_partition()
            .batch_limit(1)
            .batch_timeout(Duration::from_secs(1))
            .stream_keep_alive_limit(2)
            .build()
            .unwrap();

        // One keep-alive worth of silence, one event, then silence to
        // the keep-alive limit: the event must restart the tally.
        let mut ticks = vec![Tick::none(), Tick::none(), Tick::none()];
        ticks.push(Tick::event("orders", "0", "001", r#"{"a":1}"#));
        let consumer =
            ScriptedConsumer::from_ticks(ticks).with_tick(Duration::from_millis(600));
        let body = harness.run(consumer, config).await;
        let text = String::from_utf8(body).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        // A keep-alive before the event, the event batch itself, then
        // exactly two trailing keep-alives at the event's offset.
        assert!(lines.len() >= 4, "expected >= 4 records, got: {text}");
        assert!(lines.iter().any(|l| l.contains(r#""events""#)));
        let trailing: Vec<&&str> = lines.iter().rev().take(2).collect();
        for line in trailing {
            assert!(!line.contains(r#""events""#));
            assert!(line.contains(r#""offset":"001""#));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_blacklist_exits_without_drain() {
        let harness = Harness::new();
        harness.blacklist.block_pair("orders", "app-1");
        let config = config_one_partition()
            .batch_timeout(Duration::from_secs(1))
            .stream_keep_alive_limit(1)
            .build()
            .unwrap();

        let body = harness
            .run(
                ScriptedConsumer::from_ticks(vec![Tick::event(
                    "orders", "0", "001", r#"{"a":1}"#,
                )]),
                config,
            )
            .await;

        assert!(body.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_not_ready_exits_immediately() {
        let harness = Harness::new();
        let config = config_one_partition()
            .batch_timeout(Duration::from_secs(1))
            .build()
            .unwrap();

        let mut sink = CollectSink::new();
        let engine = EventStream::new(
            ScriptedConsumer::empty(),
            &mut sink,
            config,
            harness.blacklist.clone(),
            harness.gates.clone(),
            harness.metrics.clone(),
        );
        engine.run(Arc::new(AtomicBool::new(false))).await;

        assert!(sink.into_bytes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_partitions_offsets_non_decreasing() {
        let harness = Harness::new();
        let config = StreamConfig::builder("orders", "app-1")
            .cursors(vec![
                EventCursor::new("orders", "0", "000"),
                EventCursor::new("orders", "1", "000"),
            ])
            .batch_limit(1)
            .batch_timeout(Duration::from_secs(30))
            .stream_limit(4)
            .build()
            .unwrap();

        let consumer = ScriptedConsumer::from_ticks(vec![
            Tick::event("orders", "0", "001", r#"{"p":0}"#),
            Tick::event("orders", "1", "001", r#"{"p":1}"#),
            Tick::event("orders", "0", "002", r#"{"p":0}"#),
            Tick::event("orders", "1", "002", r#"{"p":1}"#),
        ]);
        let body = harness.run(consumer, config).await;
        let text = String::from_utf8(body).unwrap();

        let mut last_by_partition: HashMap<String, String> = HashMap::new();
        for line in text.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            let partition = value["cursor"]["partition"].as_str().unwrap().to_string();
            let offset = value["cursor"]["offset"].as_str().unwrap().to_string();
            if let Some(previous) = last_by_partition.get(&partition) {
                assert!(&offset >= previous, "offsets must be non-decreasing");
            }
            last_by_partition.insert(partition, offset);
        }
        assert_eq!(last_by_partition["0"], "002");
        assert_eq!(last_by_partition["1"], "002");
    }

    #[tokio::test(start_paused = true)]
    async fn test_string_path_matches_byte_path() {
        let ticks = || {
            ScriptedConsumer::from_ticks(vec![
                Tick::event("orders", "0", "001", r#"{"a":1}"#),
                Tick::event("orders", "0", "002", r#"{"a":2}"#),
            ])
        };
        let config = || {
            config_one_partition()
                .batch_limit(2)
                .batch_timeout(Duration::from_secs(30))
                .stream_limit(2)
                .build()
                .unwrap()
        };

        let direct = Harness::new();
        let body_direct = direct.run(ticks(), config()).await;

        let buffered = Harness::new();
        buffered
            .gates
            .disable(Feature::SendBatchViaOutputStream);
        let body_buffered = buffered.run(ticks(), config()).await;

        assert_eq!(body_direct, body_buffered);
        assert!(!body_direct.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bytes_flushed_counter_matches_body_length() {
        let harness = Harness::new();
        let config = config_one_partition()
            .batch_limit(2)
            .batch_timeout(Duration::from_secs(1))
            .stream_limit(2)
            .build()
            .unwrap();

        let consumer = ScriptedConsumer::from_ticks(vec![
            Tick::event("orders", "0", "001", r#"{"a":1}"#),
            Tick::event("orders", "0", "002", r#"{"a":2}"#),
        ]);
        let body = harness.run(consumer, config).await;

        let snap = harness.metrics.snapshot();
        assert_eq!(snap.bytes_flushed, body.len() as u64);
        assert_eq!(snap.events_streamed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_timeout_drains_pending_batch() {
        let harness = Harness::new();
        let config = config_one_partition()
            .batch_limit(10)
            .batch_timeout(Duration::from_secs(30))
            .stream_timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        let consumer = ScriptedConsumer::from_ticks(vec![Tick::event(
            "orders", "0", "001", r#"{"a":1}"#,
        )]);
        let body = harness.run(consumer, config).await;

        // The partial batch is flushed on the timeout exit.
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "{\"cursor\":{\"partition\":\"0\",\"offset\":\"001\"},\"events\":[{\"a\":1}]}\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_error_terminates_stream() {
        let harness = Harness::new();
        let config = config_one_partition()
            .batch_limit(10)
            .batch_timeout(Duration::from_secs(1))
            .stream_keep_alive_limit(10)
            .build()
            .unwrap();

        let consumer = ScriptedConsumer::from_ticks(vec![
            Tick::event("orders", "0", "001", r#"{"a":1}"#),
            Tick::error("fetch failed"),
        ]);
        let body = harness.run(consumer, config).await;

        // The pending batch is not drained on an upstream failure.
        assert!(body.is_empty());
    }
}
