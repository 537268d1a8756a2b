//! Subscription storage
//!
//! A subscription is identified by its id, and naturally keyed by
//! `(mta id, space id, app name, resource name)`: saving a subscription for
//! an existing key replaces the stored one and keeps its id. A deployment
//! replaces all of its subscriptions at once, so the ones it no longer
//! creates are removed in the same batch.

use crate::error::{RegistryError, RegistryResult as Result};
use crate::matcher::ConfigurationFilterMatcher;
use async_trait::async_trait;
use mta_model::{ConfigurationEntry, ConfigurationSubscription, SubscriptionId};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Exact-field subscription query; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionQuery {
    pub mta_id: Option<String>,
    pub space_id: Option<String>,
    pub app_name: Option<String>,
    pub resource_name: Option<String>,
}

impl SubscriptionQuery {
    pub fn mta_id(mut self, mta_id: impl Into<String>) -> Self {
        self.mta_id = Some(mta_id.into());
        self
    }

    pub fn space_id(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn resource_name(mut self, resource_name: impl Into<String>) -> Self {
        self.resource_name = Some(resource_name.into());
        self
    }

    pub fn matches(&self, subscription: &ConfigurationSubscription) -> bool {
        fn field_matches(expected: &Option<String>, actual: &str) -> bool {
            expected.as_deref().map_or(true, |e| e == actual)
        }

        field_matches(&self.mta_id, &subscription.mta_id)
            && field_matches(&self.space_id, &subscription.space_id)
            && field_matches(&self.app_name, &subscription.app_name)
            && field_matches(&self.resource_name, &subscription.resource_name)
    }
}

/// Stored subscriptions changed by [`SubscriptionStore::replace_all`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionChanges {
    pub saved: Vec<ConfigurationSubscription>,
    pub removed: Vec<ConfigurationSubscription>,
}

/// Durable store of configuration subscriptions
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or replace one subscription
    async fn save(&self, subscription: ConfigurationSubscription)
        -> Result<ConfigurationSubscription>;

    /// Make `batch` the complete set of subscriptions within `scope`. Every
    /// subscription of the batch is upserted and every other one matching
    /// `scope` is removed. Readers never observe part of the change.
    async fn replace_all(
        &self,
        scope: &SubscriptionQuery,
        batch: Vec<ConfigurationSubscription>,
    ) -> Result<SubscriptionChanges>;

    /// Subscriptions matching `query`, ordered by id
    async fn find_all(&self, query: &SubscriptionQuery) -> Result<Vec<ConfigurationSubscription>>;

    /// Subscriptions whose filter matches at least one of `entries`
    async fn find_matching(
        &self,
        entries: &[ConfigurationEntry],
    ) -> Result<Vec<ConfigurationSubscription>>;

    /// Remove a subscription
    async fn delete(&self, id: SubscriptionId) -> Result<()>;
}

/// In-memory subscription store
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<BTreeMap<SubscriptionId, ConfigurationSubscription>>,
    matcher: ConfigurationFilterMatcher,
}

impl InMemorySubscriptionStore {
    pub fn new(matcher: ConfigurationFilterMatcher) -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            matcher,
        }
    }
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new(ConfigurationFilterMatcher::default())
    }
}

fn same_key(a: &ConfigurationSubscription, b: &ConfigurationSubscription) -> bool {
    a.mta_id == b.mta_id
        && a.space_id == b.space_id
        && a.app_name == b.app_name
        && a.resource_name == b.resource_name
}

fn upsert(
    subscriptions: &mut BTreeMap<SubscriptionId, ConfigurationSubscription>,
    mut subscription: ConfigurationSubscription,
) -> ConfigurationSubscription {
    let existing = subscriptions
        .values()
        .find(|stored| same_key(stored, &subscription))
        .map(|stored| stored.id);
    subscription.id = match existing {
        Some(id) => id,
        None => subscriptions.keys().next_back().map_or(1, |last| last + 1),
    };
    subscriptions.insert(subscription.id, subscription.clone());
    subscription
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn save(
        &self,
        subscription: ConfigurationSubscription,
    ) -> Result<ConfigurationSubscription> {
        let mut subscriptions = self.subscriptions.write().await;
        Ok(upsert(&mut *subscriptions, subscription))
    }

    async fn replace_all(
        &self,
        scope: &SubscriptionQuery,
        batch: Vec<ConfigurationSubscription>,
    ) -> Result<SubscriptionChanges> {
        let mut subscriptions = self.subscriptions.write().await;
        let stale: Vec<SubscriptionId> = subscriptions
            .values()
            .filter(|stored| scope.matches(stored) && !batch.iter().any(|s| same_key(stored, s)))
            .map(|stored| stored.id)
            .collect();
        let removed: Vec<_> = stale
            .iter()
            .filter_map(|id| subscriptions.remove(id))
            .collect();
        let saved: Vec<_> = batch
            .into_iter()
            .map(|subscription| upsert(&mut *subscriptions, subscription))
            .collect();
        debug!(saved = saved.len(), removed = removed.len(), "Replaced subscriptions");
        Ok(SubscriptionChanges { saved, removed })
    }

    async fn find_all(&self, query: &SubscriptionQuery) -> Result<Vec<ConfigurationSubscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect())
    }

    async fn find_matching(
        &self,
        entries: &[ConfigurationEntry],
    ) -> Result<Vec<ConfigurationSubscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .values()
            .filter(|s| entries.iter().any(|e| self.matcher.matches(e, &s.filter)))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: SubscriptionId) -> Result<()> {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions
            .remove(&id)
            .map(|_| ())
            .ok_or(RegistryError::SubscriptionNotFound(id))
    }
}
