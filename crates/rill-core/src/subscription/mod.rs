//! Subscription model, persistence port, and services.
//!
//! A subscription is a named, server-side-tracked consumer position
//! set, keyed by `(owning_application, event_types, consumer_group)`.
//! Creation is idempotent across requests: concurrent creates with the
//! same key produce at most one insertion, and the loser recovers the
//! winner's row.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SubscriptionError;

/// Persistence port and in-memory store.
pub mod store;

/// The create-or-get, list, get, and stats services.
pub mod service;

/// Pagination link construction for list responses.
pub mod pagination;

/// Per-event-type live lag projection.
pub mod stats;

pub use service::{CreateOutcome, SubscriptionService};
pub use store::{InMemorySubscriptionStore, SubscriptionStore};

/// Consumer group used when the client does not name one.
pub const DEFAULT_CONSUMER_GROUP: &str = "default";

fn default_consumer_group() -> String {
    DEFAULT_CONSUMER_GROUP.to_string()
}

/// The uniqueness key of a subscription.
///
/// `event_types` is a `BTreeSet`, so the key is canonicalized
/// lexicographically: `{a,b}` and `{b,a}` collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// Application owning the subscription.
    pub owning_application: String,
    /// Event types consumed, canonical order.
    pub event_types: BTreeSet<String>,
    /// Consumer group within the owning application.
    pub consumer_group: String,
}

/// The client-supplied part of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionBase {
    /// Application owning the subscription.
    pub owning_application: String,
    /// Event types to consume.
    pub event_types: BTreeSet<String>,
    /// Consumer group; defaults to [`DEFAULT_CONSUMER_GROUP`].
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
}

impl SubscriptionBase {
    /// Creates a base with the default consumer group.
    #[must_use]
    pub fn new<I, S>(owning_application: impl Into<String>, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owning_application: owning_application.into(),
            event_types: event_types.into_iter().map(Into::into).collect(),
            consumer_group: default_consumer_group(),
        }
    }

    /// Sets the consumer group.
    #[must_use]
    pub fn with_consumer_group(mut self, group: impl Into<String>) -> Self {
        self.consumer_group = group.into();
        self
    }

    /// Returns the uniqueness key of this base.
    #[must_use]
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey {
            owning_application: self.owning_application.clone(),
            event_types: self.event_types.clone(),
            consumer_group: self.consumer_group.clone(),
        }
    }

    /// Checks the fields a store cannot: non-empty owner, at least one
    /// event type, non-empty consumer group.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Validation`] naming the offending
    /// field.
    pub fn validate(&self) -> Result<(), SubscriptionError> {
        if self.owning_application.trim().is_empty() {
            return Err(SubscriptionError::Validation(
                "owning_application may not be empty".into(),
            ));
        }
        if self.event_types.is_empty() {
            return Err(SubscriptionError::Validation(
                "event_types must contain at least one event type".into(),
            ));
        }
        if self.consumer_group.trim().is_empty() {
            return Err(SubscriptionError::Validation(
                "consumer_group may not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// A persisted subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Server-assigned identifier.
    pub id: String,
    /// Application owning the subscription.
    pub owning_application: String,
    /// Event types consumed, canonical order.
    pub event_types: BTreeSet<String>,
    /// Consumer group within the owning application.
    pub consumer_group: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Returns the uniqueness key of this subscription.
    #[must_use]
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey {
            owning_application: self.owning_application.clone(),
            event_types: self.event_types.clone(),
            consumer_group: self.consumer_group.clone(),
        }
    }
}

/// Filter applied when listing subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    /// Keep subscriptions owned by this application.
    pub owning_application: Option<String>,
    /// Keep subscriptions consuming all of these event types. Empty
    /// means no event-type filtering.
    pub event_types: BTreeSet<String>,
}

impl SubscriptionFilter {
    /// Returns whether `subscription` passes the filter.
    #[must_use]
    pub fn matches(&self, subscription: &Subscription) -> bool {
        if let Some(owner) = &self.owning_application {
            if &subscription.owning_application != owner {
                return false;
            }
        }
        self.event_types
            .iter()
            .all(|et| subscription.event_types.contains(et))
    }
}
