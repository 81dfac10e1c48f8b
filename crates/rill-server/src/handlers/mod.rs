//! Request handlers.

/// The raw consumption stream.
pub mod streaming;

/// Subscription management.
pub mod subscriptions;
