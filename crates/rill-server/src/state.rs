//! Shared handler state.

use std::sync::Arc;

use rill_core::blacklist::ConsumptionBlacklist;
use rill_core::consumer::ConsumerFactory;
use rill_core::features::FeatureGates;
use rill_core::registry::EventTypeRepository;
use rill_core::stream::StreamMetrics;
use rill_core::subscription::SubscriptionService;

/// Ports and services shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Subscription management orchestration.
    pub subscriptions: SubscriptionService,
    /// Event-type lookups for the streaming endpoint.
    pub event_types: Arc<dyn EventTypeRepository>,
    /// Source of consumers for the streaming endpoint.
    pub consumer_factory: Arc<dyn ConsumerFactory>,
    /// Consumption circuit-breaker.
    pub blacklist: Arc<dyn ConsumptionBlacklist>,
    /// Feature gates.
    pub gates: Arc<dyn FeatureGates>,
    /// Process-wide streaming counters.
    pub stream_metrics: Arc<StreamMetrics>,
}
