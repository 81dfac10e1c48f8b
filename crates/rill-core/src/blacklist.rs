//! Consumption circuit-breaker port.
//!
//! The blacklist answers one question: is consumption currently blocked
//! for an `(event-type, consuming-app)` pair? The streaming engine
//! checks it at the top of every loop iteration, so implementations
//! must be cheap and safe for concurrent reads.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Answers whether consumption is administratively blocked.
pub trait ConsumptionBlacklist: Send + Sync {
    /// Returns `true` when streaming must halt for this pair.
    fn is_consumption_blocked(&self, event_type: &str, app: &str) -> bool;
}

/// Block entry granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Entry {
    EventType(String),
    App(String),
    Pair(String, String),
}

/// In-memory blacklist used by the server and in tests.
///
/// Supports blocking a whole event type, a whole consuming application,
/// or a specific pair.
#[derive(Debug, Default)]
pub struct InMemoryBlacklist {
    entries: RwLock<HashSet<Entry>>,
}

impl InMemoryBlacklist {
    /// Creates an empty blacklist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks all consumption of an event type.
    pub fn block_event_type(&self, event_type: impl Into<String>) {
        self.entries
            .write()
            .insert(Entry::EventType(event_type.into()));
    }

    /// Blocks all consumption by an application.
    pub fn block_app(&self, app: impl Into<String>) {
        self.entries.write().insert(Entry::App(app.into()));
    }

    /// Blocks one `(event-type, app)` pair.
    pub fn block_pair(&self, event_type: impl Into<String>, app: impl Into<String>) {
        self.entries
            .write()
            .insert(Entry::Pair(event_type.into(), app.into()));
    }

    /// Removes every block entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl ConsumptionBlacklist for InMemoryBlacklist {
    fn is_consumption_blocked(&self, event_type: &str, app: &str) -> bool {
        let entries = self.entries.read();
        entries.contains(&Entry::EventType(event_type.to_string()))
            || entries.contains(&Entry::App(app.to_string()))
            || entries.contains(&Entry::Pair(event_type.to_string(), app.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_blocks_nothing() {
        let blacklist = InMemoryBlacklist::new();
        assert!(!blacklist.is_consumption_blocked("orders", "app-1"));
    }

    #[test]
    fn test_block_event_type() {
        let blacklist = InMemoryBlacklist::new();
        blacklist.block_event_type("orders");
        assert!(blacklist.is_consumption_blocked("orders", "app-1"));
        assert!(blacklist.is_consumption_blocked("orders", "app-2"));
        assert!(!blacklist.is_consumption_blocked("payments", "app-1"));
    }

    #[test]
    fn test_block_app() {
        let blacklist = InMemoryBlacklist::new();
        blacklist.block_app("app-1");
        assert!(blacklist.is_consumption_blocked("orders", "app-1"));
        assert!(!blacklist.is_consumption_blocked("orders", "app-2"));
    }

    #[test]
    fn test_block_pair_and_clear() {
        let blacklist = InMemoryBlacklist::new();
        blacklist.block_pair("orders", "app-1");
        assert!(blacklist.is_consumption_blocked("orders", "app-1"));
        assert!(!blacklist.is_consumption_blocked("orders", "app-2"));
        assert!(!blacklist.is_consumption_blocked("payments", "app-1"));

        blacklist.clear();
        assert!(!blacklist.is_consumption_blocked("orders", "app-1"));
    }
}
