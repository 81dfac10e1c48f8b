//! The create-or-get, list, get, and stats services.
//!
//! Stateless request-scoped orchestration over the subscription store,
//! the event-type repository, the application registry, and the feature
//! gates. The interesting property is idempotent creation: a create
//! that loses the insertion race to a concurrent creator with the same
//! key recovers the winner's row and reports it as already existing.

use std::sync::Arc;

use tracing::{debug, error};

use super::pagination::{subscription_pagination_links, PaginationLinks};
use super::stats::{
    ConsumerStateSource, PartitionStats, SubscriptionEventTypeStats,
};
use super::store::SubscriptionStore;
use super::{Subscription, SubscriptionBase, SubscriptionFilter};
use crate::error::{StoreError, SubscriptionError};
use crate::features::{Feature, FeatureGates};
use crate::registry::{ApplicationRegistry, Client, EventType, EventTypeRepository};

/// Maximum page size accepted by `list`.
pub const MAX_LIMIT: usize = 1000;

/// How a create-or-get request was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The subscription was inserted by this request.
    Created(Subscription),
    /// A subscription with the same key already existed.
    Existing(Subscription),
}

impl CreateOutcome {
    /// The subscription either way.
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        match self {
            CreateOutcome::Created(s) | CreateOutcome::Existing(s) => s,
        }
    }
}

/// Subscription management orchestration.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    event_types: Arc<dyn EventTypeRepository>,
    applications: Arc<dyn ApplicationRegistry>,
    consumer_state: Arc<dyn ConsumerStateSource>,
    gates: Arc<dyn FeatureGates>,
}

impl SubscriptionService {
    /// Creates the service over its ports.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        event_types: Arc<dyn EventTypeRepository>,
        applications: Arc<dyn ApplicationRegistry>,
        consumer_state: Arc<dyn ConsumerStateSource>,
        gates: Arc<dyn FeatureGates>,
    ) -> Self {
        Self {
            store,
            event_types,
            applications,
            consumer_state,
            gates,
        }
    }

    /// Creates a subscription, or returns the existing one with the
    /// same key.
    ///
    /// No subscription is ever returned that was not durably
    /// persisted: a creation race that cannot recover the winner's row
    /// fails the request instead.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] per the management API contract:
    /// `FeatureDisabled`, `Validation`, `OwnerUnknown`,
    /// `MissingEventTypes`, `ScopeDenied`, `Unavailable`, or
    /// `Internal`.
    pub async fn create_or_get(
        &self,
        base: SubscriptionBase,
        client: &Client,
    ) -> Result<CreateOutcome, SubscriptionError> {
        if !self.gates.is_enabled(Feature::HighLevelApi) {
            return Err(SubscriptionError::FeatureDisabled);
        }
        base.validate()?;

        if self.gates.is_enabled(Feature::CheckOwningApplication)
            && !self.applications.exists(&base.owning_application).await
        {
            return Err(SubscriptionError::OwnerUnknown);
        }

        let resolved = self.resolve_event_types(&base).await?;
        for event_type in &resolved {
            if !client.holds_any(&event_type.read_scopes) {
                debug!(
                    client = %client.client_id,
                    event_type = %event_type.name,
                    "client lacks read scope for subscription"
                );
                return Err(SubscriptionError::ScopeDenied(event_type.name.clone()));
            }
        }

        match self.store.create(base.clone()).await {
            Ok(subscription) => Ok(CreateOutcome::Created(subscription)),
            Err(StoreError::Duplicated) => self.recover_existing(&base).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up the requested event types, collecting the missing
    /// names.
    async fn resolve_event_types(
        &self,
        base: &SubscriptionBase,
    ) -> Result<Vec<EventType>, SubscriptionError> {
        let mut resolved = Vec::with_capacity(base.event_types.len());
        let mut missing = Vec::new();
        for name in &base.event_types {
            match self.event_types.find_by_name(name).await? {
                Some(event_type) => resolved.push(event_type),
                None => missing.push(name.clone()),
            }
        }
        if missing.is_empty() {
            Ok(resolved)
        } else {
            // BTreeSet iteration already yields lexicographic order;
            // keep it explicit for the error message contract.
            missing.sort();
            Err(SubscriptionError::MissingEventTypes(missing))
        }
    }

    /// Recovers the row that won the insertion race.
    async fn recover_existing(
        &self,
        base: &SubscriptionBase,
    ) -> Result<CreateOutcome, SubscriptionError> {
        match self.store.get_by_key(&base.key()).await {
            Ok(existing) => Ok(CreateOutcome::Existing(existing)),
            Err(StoreError::NotFound) => {
                error!(
                    owning_application = %base.owning_application,
                    "duplicate subscription disappeared during recovery lookup"
                );
                Err(SubscriptionError::Internal(
                    "subscription already exists but could not be fetched".into(),
                ))
            }
            Err(e) => {
                error!(error = %e, "error fetching existing subscription");
                Err(e.into())
            }
        }
    }

    /// Fetches one subscription by id.
    ///
    /// # Errors
    ///
    /// Returns `FeatureDisabled`, `NotFound`, or `Unavailable`.
    pub async fn get(&self, id: &str) -> Result<Subscription, SubscriptionError> {
        if !self.gates.is_enabled(Feature::HighLevelApi) {
            return Err(SubscriptionError::FeatureDisabled);
        }
        match self.store.get(id).await {
            Ok(subscription) => Ok(subscription),
            Err(StoreError::NotFound) => {
                debug!(subscription_id = id, "subscription not found");
                Err(SubscriptionError::NotFound)
            }
            Err(e) => {
                error!(subscription_id = id, error = %e, "error fetching subscription");
                Err(e.into())
            }
        }
    }

    /// Lists subscriptions with pagination links.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when `limit` is outside `1..=1000`,
    /// `FeatureDisabled`, or `Unavailable`.
    pub async fn list(
        &self,
        filter: SubscriptionFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Subscription>, PaginationLinks), SubscriptionError> {
        if !self.gates.is_enabled(Feature::HighLevelApi) {
            return Err(SubscriptionError::FeatureDisabled);
        }
        if limit < 1 || limit > MAX_LIMIT {
            return Err(SubscriptionError::Validation(
                "'limit' parameter should have value from 1 to 1000".into(),
            ));
        }

        let items = match self.store.list(&filter, offset, limit).await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "error listing subscriptions");
                return Err(e.into());
            }
        };
        let links = subscription_pagination_links(
            filter.owning_application.as_deref(),
            &filter.event_types,
            offset,
            limit,
            items.len(),
        );
        Ok((items, links))
    }

    /// Projects live per-event-type stats for one subscription.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids or `Unavailable` when the
    /// store is unreachable.
    pub async fn stats(
        &self,
        id: &str,
    ) -> Result<Vec<SubscriptionEventTypeStats>, SubscriptionError> {
        let subscription = match self.store.get(id).await {
            Ok(subscription) => subscription,
            Err(StoreError::NotFound) => {
                debug!(subscription_id = id, "subscription not found");
                return Err(SubscriptionError::NotFound);
            }
            Err(e) => {
                error!(subscription_id = id, error = %e, "error fetching subscription stats");
                return Err(e.into());
            }
        };

        let mut items = Vec::with_capacity(subscription.event_types.len());
        for name in &subscription.event_types {
            let partitions = match self.event_types.find_by_name(name).await? {
                Some(event_type) => event_type.partitions,
                None => {
                    debug!(event_type = %name, "subscribed event type no longer exists");
                    Vec::new()
                }
            };
            let partition_stats = partitions
                .iter()
                .map(|partition| match self.consumer_state.partition_lag(name, partition) {
                    Some(lag) => PartitionStats::assigned(partition.clone(), lag),
                    None => PartitionStats::unassigned(partition.clone()),
                })
                .collect();
            items.push(SubscriptionEventTypeStats {
                event_type: name.clone(),
                partitions: partition_stats,
            });
        }
        Ok(items)
    }
}
