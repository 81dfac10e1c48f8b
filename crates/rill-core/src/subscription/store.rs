//! Subscription persistence port and the in-memory reference store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{Subscription, SubscriptionBase, SubscriptionFilter, SubscriptionKey};
use crate::error::StoreError;

/// Persists subscriptions with unique-key semantics.
///
/// `create` enforces uniqueness over the key
/// `(owning_application, event_types, consumer_group)`: of two
/// concurrent creates with the same key, at most one inserts; the other
/// observes [`StoreError::Duplicated`].
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Persists a new subscription, assigning its id and creation
    /// instant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicated`] when the key is taken, or
    /// [`StoreError::Unavailable`] when the store is unreachable.
    async fn create(&self, base: SubscriptionBase) -> Result<Subscription, StoreError>;

    /// Looks up a subscription by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    async fn get(&self, id: &str) -> Result<Subscription, StoreError>;

    /// Looks up a subscription by its uniqueness key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no subscription has the
    /// key.
    async fn get_by_key(&self, key: &SubscriptionKey) -> Result<Subscription, StoreError>;

    /// Lists subscriptions passing `filter`, in stable creation order,
    /// skipping `offset` and returning at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store is
    /// unreachable.
    async fn list(
        &self,
        filter: &SubscriptionFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Subscription>, StoreError>;
}

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<String, Subscription>,
    by_key: HashMap<SubscriptionKey, String>,
    creation_order: Vec<String>,
}

/// In-memory store with the reference unique-key semantics.
///
/// Backs the server's local mode and the test suites. Reads can be
/// made to fail to exercise the duplicate-recovery path.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    inner: Mutex<Inner>,
    fail_reads: std::sync::atomic::AtomicBool,
}

impl InMemorySubscriptionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read operation fail with
    /// [`StoreError::Unavailable`] until reset. Writes still work, so
    /// a create can observe a duplicate whose recovery lookup fails.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads
            .store(fail, std::sync::atomic::Ordering::Relaxed);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(StoreError::Unavailable("read replica down".into()));
        }
        Ok(())
    }

    /// Removes a subscription, freeing its key. Returns whether a row
    /// was removed.
    pub fn delete(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(subscription) = inner.by_id.remove(id) else {
            return false;
        };
        inner.by_key.remove(&subscription.key());
        inner.creation_order.retain(|existing| existing != id);
        true
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn create(&self, base: SubscriptionBase) -> Result<Subscription, StoreError> {
        let key = base.key();
        let mut inner = self.inner.lock();
        if inner.by_key.contains_key(&key) {
            return Err(StoreError::Duplicated);
        }

        let subscription = Subscription {
            id: Uuid::new_v4().to_string(),
            owning_application: base.owning_application,
            event_types: base.event_types,
            consumer_group: base.consumer_group,
            created_at: Utc::now(),
        };
        inner.by_key.insert(key, subscription.id.clone());
        inner.creation_order.push(subscription.id.clone());
        inner
            .by_id
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn get(&self, id: &str) -> Result<Subscription, StoreError> {
        self.check_reads()?;
        self.inner
            .lock()
            .by_id
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_key(&self, key: &SubscriptionKey) -> Result<Subscription, StoreError> {
        self.check_reads()?;
        let inner = self.inner.lock();
        inner
            .by_key
            .get(key)
            .and_then(|id| inner.by_id.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(
        &self,
        filter: &SubscriptionFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Subscription>, StoreError> {
        self.check_reads()?;
        let inner = self.inner.lock();
        Ok(inner
            .creation_order
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|subscription| filter.matches(subscription))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
