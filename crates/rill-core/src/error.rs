//! Core error types.
//!
//! One enum per concern, mirroring the failure categories the HTTP layer
//! maps to problem responses:
//! - [`ConsumerError`]: failures of the partition consumer port
//! - [`StoreError`]: failures of the subscription store port
//! - [`SubscriptionError`]: failures of the subscription service

use thiserror::Error;

/// Errors raised by a partition consumer.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The backing log failed to fetch or assign.
    #[error("upstream log error: {0}")]
    Upstream(String),

    /// A cursor could not be mapped onto the backing log.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// The consumer is not in a state that allows the operation
    /// (e.g. a partition was revoked mid-stream).
    #[error("illegal consumer state: {0}")]
    IllegalState(String),

    /// The backing log returned bytes that are not valid event text.
    #[error("malformed event payload: {0}")]
    Malformed(String),

    /// The consumer has been closed.
    #[error("consumer closed")]
    Closed,
}

/// Errors raised by the subscription store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A subscription with the same key already exists.
    #[error("subscription already exists")]
    Duplicated,

    /// No subscription matched the lookup.
    #[error("subscription not found")]
    NotFound,

    /// The backing database is unreachable.
    #[error("subscription store unavailable: {0}")]
    Unavailable(String),

    /// An internal store failure that doesn't fit other categories.
    #[error("internal store error: {0}")]
    Internal(String),
}

/// Errors raised by the subscription service.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The high-level API feature gate is off.
    #[error("high level API is disabled")]
    FeatureDisabled,

    /// The owning application is unknown to the application registry.
    #[error("owning_application doesn't exist")]
    OwnerUnknown,

    /// One or more requested event types do not exist.
    #[error("{}", missing_event_types_message(.0))]
    MissingEventTypes(Vec<String>),

    /// The client does not hold a required read scope.
    #[error("access denied: missing read scope for event type '{0}'")]
    ScopeDenied(String),

    /// The request was syntactically valid but semantically rejected.
    #[error("{0}")]
    Validation(String),

    /// No subscription matched the lookup.
    #[error("subscription not found")]
    NotFound,

    /// The subscription store is unreachable.
    #[error("service temporarily unavailable: {0}")]
    Unavailable(String),

    /// An internal failure that doesn't fit other categories.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for SubscriptionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => SubscriptionError::NotFound,
            StoreError::Unavailable(msg) => SubscriptionError::Unavailable(msg),
            StoreError::Duplicated => {
                SubscriptionError::Internal("unexpected duplicate subscription".into())
            }
            StoreError::Internal(msg) => SubscriptionError::Internal(msg),
        }
    }
}

/// Renders the missing-event-types message with names single-quoted and
/// comma-separated, e.g. `event type(s) not found: 'a','b'`.
fn missing_event_types_message(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    format!(
        "Failed to create subscription, event type(s) not found: {}",
        quoted.join(",")
    )
}
