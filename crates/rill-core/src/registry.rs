//! Event-type and application registries.
//!
//! The subscription service resolves requested event-type names and
//! checks owning-application existence through these ports. The broker's
//! authoritative registries live elsewhere; the in-memory variants here
//! back the server's local mode and the test suites.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A named, schema-bound, partitioned log of events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType {
    /// Unique event-type name.
    pub name: String,
    /// Scopes a client must hold to consume this event type. Empty
    /// means unrestricted.
    #[serde(default)]
    pub read_scopes: BTreeSet<String>,
    /// Partition identifiers of this event type's log.
    #[serde(default)]
    pub partitions: Vec<String>,
}

impl EventType {
    /// Creates an unrestricted event type with the given partitions.
    #[must_use]
    pub fn new(name: impl Into<String>, partitions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            read_scopes: BTreeSet::new(),
            partitions,
        }
    }

    /// Adds required read scopes.
    #[must_use]
    pub fn with_read_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

/// Lookup of event types by name.
#[async_trait]
pub trait EventTypeRepository: Send + Sync {
    /// Finds an event type, returning `Ok(None)` when the name is
    /// unknown.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the registry cannot be
    /// reached.
    async fn find_by_name(&self, name: &str) -> Result<Option<EventType>, StoreError>;
}

/// Existence checks for owning applications.
#[async_trait]
pub trait ApplicationRegistry: Send + Sync {
    /// Returns whether the application is known.
    async fn exists(&self, name: &str) -> bool;
}

/// The authenticated client principal of a request.
///
/// Carries the client identity and its granted scopes; the subscription
/// service checks event-type read scopes against it before creating a
/// subscription.
#[derive(Debug, Clone)]
pub struct Client {
    /// Client identity string.
    pub client_id: String,
    /// Scopes granted to the client. `None` disables scope checking
    /// (trusted internal caller).
    pub scopes: Option<BTreeSet<String>>,
}

impl Client {
    /// Creates a client with explicit scopes.
    #[must_use]
    pub fn new<I, S>(client_id: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client_id: client_id.into(),
            scopes: Some(scopes.into_iter().map(Into::into).collect()),
        }
    }

    /// Creates a trusted client that bypasses scope checks.
    #[must_use]
    pub fn trusted(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            scopes: None,
        }
    }

    /// Returns whether the client holds at least one of `required`.
    ///
    /// An empty `required` set means the event type is unrestricted.
    #[must_use]
    pub fn holds_any(&self, required: &BTreeSet<String>) -> bool {
        if required.is_empty() {
            return true;
        }
        match &self.scopes {
            None => true,
            Some(granted) => required.iter().any(|scope| granted.contains(scope)),
        }
    }
}
