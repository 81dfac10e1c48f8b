//! Testing utilities.
//!
//! Scripted fixtures for exercising the streaming engine and the
//! subscription service without a backing log or database:
//!
//! - [`ScriptedConsumer`]: plays back a fixed sequence of ticks
//! - [`CollectSink`]: an in-memory byte sink
//! - [`StaticEventTypes`] / [`StaticApplications`]: fixed registries

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::consumer::{ConsumerFactory, EventConsumer};
use crate::cursor::EventCursor;
use crate::error::{ConsumerError, StoreError};
use crate::event::ConsumedEvent;
use crate::registry::{ApplicationRegistry, EventType, EventTypeRepository};

/// One scripted consumer response.
#[derive(Debug, Clone)]
pub enum Tick {
    /// An event arrives.
    Event(ConsumedEvent),
    /// Nothing this tick.
    None,
    /// The backing log fails.
    Error(String),
}

impl Tick {
    /// An event tick.
    #[must_use]
    pub fn event(
        event_type: impl Into<String>,
        partition: impl Into<String>,
        offset: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Tick::Event(ConsumedEvent::new(
            payload,
            EventCursor::new(event_type, partition, offset),
        ))
    }

    /// An empty tick.
    #[must_use]
    pub fn none() -> Self {
        Tick::None
    }

    /// An upstream failure tick.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Tick::Error(message.into())
    }
}

/// A consumer that plays back a fixed script, then returns empty ticks.
///
/// Each `read_event` sleeps for the tick duration first, standing in
/// for the poll budget of a real consumer; under
/// `tokio::test(start_paused = true)` the sleeps auto-advance, keeping
/// timing-sensitive engine tests fast and deterministic.
#[derive(Debug)]
pub struct ScriptedConsumer {
    script: Vec<Tick>,
    next: usize,
    tick: Duration,
    closed: bool,
}

impl ScriptedConsumer {
    /// A consumer that never yields an event.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_ticks(Vec::new())
    }

    /// A consumer playing back `ticks`, then empty forever.
    #[must_use]
    pub fn from_ticks(ticks: Vec<Tick>) -> Self {
        Self {
            script: ticks,
            next: 0,
            tick: Duration::from_millis(50),
            closed: false,
        }
    }

    /// Overrides the simulated poll budget per tick.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Returns whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl EventConsumer for ScriptedConsumer {
    async fn read_event(&mut self) -> Result<Option<ConsumedEvent>, ConsumerError> {
        tokio::time::sleep(self.tick).await;
        if self.closed {
            return Err(ConsumerError::Closed);
        }
        let Some(tick) = self.script.get(self.next).cloned() else {
            return Ok(None);
        };
        self.next += 1;
        match tick {
            Tick::Event(event) => Ok(Some(event)),
            Tick::None => Ok(None),
            Tick::Error(message) => Err(ConsumerError::Upstream(message)),
        }
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        self.closed = true;
        Ok(())
    }
}

/// A factory handing out scripted consumers, one script per call.
pub struct ScriptedConsumerFactory {
    scripts: parking_lot::Mutex<Vec<Vec<Tick>>>,
}

impl ScriptedConsumerFactory {
    /// A factory whose consumers never yield events.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            scripts: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// A factory that serves the given scripts in order, then empty
    /// consumers.
    #[must_use]
    pub fn with_scripts(scripts: Vec<Vec<Tick>>) -> Self {
        Self {
            scripts: parking_lot::Mutex::new(scripts),
        }
    }
}

#[async_trait]
impl ConsumerFactory for ScriptedConsumerFactory {
    async fn create_consumer(
        &self,
        _event_type: &EventType,
        _cursors: Option<Vec<EventCursor>>,
    ) -> Result<Box<dyn EventConsumer>, ConsumerError> {
        let mut scripts = self.scripts.lock();
        let script = if scripts.is_empty() {
            Vec::new()
        } else {
            scripts.remove(0)
        };
        Ok(Box::new(ScriptedConsumer::from_ticks(script)))
    }
}

/// An in-memory byte sink for asserting framed output.
#[derive(Debug, Default)]
pub struct CollectSink {
    bytes: Vec<u8>,
}

impl CollectSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the sink and returns everything written to it.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsyncWrite for CollectSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.bytes.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A fixed set of event types.
#[derive(Debug, Default)]
pub struct StaticEventTypes {
    by_name: HashMap<String, EventType>,
}

impl StaticEventTypes {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event type.
    #[must_use]
    pub fn with(mut self, event_type: EventType) -> Self {
        self.by_name.insert(event_type.name.clone(), event_type);
        self
    }
}

#[async_trait]
impl EventTypeRepository for StaticEventTypes {
    async fn find_by_name(&self, name: &str) -> Result<Option<EventType>, StoreError> {
        Ok(self.by_name.get(name).cloned())
    }
}

/// A fixed set of known applications.
#[derive(Debug, Default)]
pub struct StaticApplications {
    names: Vec<String>,
}

impl StaticApplications {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a known application.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }
}

#[async_trait]
impl ApplicationRegistry for StaticApplications {
    async fn exists(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}
