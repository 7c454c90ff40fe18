//! Resource enumeration across subscriptions
//!
//! "All subscriptions" listings fan out one request per subscription through a
//! [`BoundedPool`]. A failing subscription is recorded next to the results instead
//! of aborting the enumeration.

use crate::azure::management::ManagementApi;
use crate::azure::models::{Registry, ResourceGroup, Subscription};
use crate::concurrency::BoundedPool;
use crate::config::PoolConfig;
use crate::error::{AcrError, Result};
use crate::logging::Logger;

/// A subscription whose listing failed
#[derive(Debug)]
pub struct SubscriptionFailure {
    pub subscription_id: String,
    pub display_name: String,
    pub error: AcrError,
}

/// Aggregated listing with per-subscription failures
#[derive(Debug)]
pub struct Enumeration<T> {
    pub items: Vec<T>,
    pub failures: Vec<SubscriptionFailure>,
}

impl<T> Enumeration<T> {
    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items,
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Items, or the first failure when nothing at all succeeded
    pub fn into_result(self) -> Result<Vec<T>> {
        if self.items.is_empty() {
            if let Some(failure) = self.failures.into_iter().next() {
                return Err(failure.error);
            }
        }
        Ok(self.items)
    }
}

/// Which registries to list
#[derive(Debug, Clone, Copy)]
pub enum RegistryScope<'s> {
    AllSubscriptions,
    Subscription(&'s Subscription),
    ResourceGroup(&'s Subscription, &'s str),
}

pub struct ResourceEnumerator<'a> {
    api: &'a dyn ManagementApi,
    limits: PoolConfig,
    output: Logger,
}

impl<'a> ResourceEnumerator<'a> {
    pub fn new(api: &'a dyn ManagementApi, limits: PoolConfig, output: Logger) -> Self {
        Self { api, limits, output }
    }

    /// Resource groups of every given subscription
    pub async fn list_resource_groups(&self, subscriptions: &[Subscription]) -> Enumeration<ResourceGroup> {
        let pool = BoundedPool::new(self.limits.resource_groups);
        self.output.verbose(&format!(
            "Listing resource groups across {} subscriptions ({} at a time)",
            subscriptions.len(),
            pool.limit()
        ));

        let results = pool
            .run_all(subscriptions.iter(), |subscription| {
                self.api.list_resource_groups(subscription)
            })
            .await;

        self.collect(subscriptions, results, "resource group listing")
    }

    /// Registries of every given subscription
    pub async fn list_registries(&self, subscriptions: &[Subscription]) -> Enumeration<Registry> {
        let pool = BoundedPool::new(self.limits.registries);
        self.output.verbose(&format!(
            "Listing registries across {} subscriptions ({} at a time)",
            subscriptions.len(),
            pool.limit()
        ));

        let results = pool
            .run_all(subscriptions.iter(), |subscription| self.api.list_registries(subscription))
            .await;

        self.collect(subscriptions, results, "registry listing")
    }

    /// Registries for a scope, optionally sorted by name
    pub async fn registries(
        &self,
        scope: RegistryScope<'_>,
        subscriptions: &[Subscription],
        sort_by_name: bool,
    ) -> Result<Enumeration<Registry>> {
        let mut enumeration = match scope {
            RegistryScope::AllSubscriptions => self.list_registries(subscriptions).await,
            RegistryScope::Subscription(subscription) => {
                Enumeration::from_items(self.api.list_registries(subscription).await?)
            }
            RegistryScope::ResourceGroup(subscription, resource_group) => Enumeration::from_items(
                self.api
                    .list_registries_by_resource_group(subscription, resource_group)
                    .await?,
            ),
        };

        if sort_by_name && enumeration.items.len() > 1 {
            enumeration
                .items
                .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        }

        Ok(enumeration)
    }

    fn collect<T>(
        &self,
        subscriptions: &[Subscription],
        results: Vec<Result<Vec<T>>>,
        operation: &str,
    ) -> Enumeration<T> {
        let mut enumeration = Enumeration::from_items(Vec::new());

        for (subscription, result) in subscriptions.iter().zip(results) {
            match result {
                Ok(items) => enumeration.items.extend(items),
                Err(error) => {
                    self.output.warning(&format!(
                        "{} failed for subscription {} ({}): {}",
                        operation, subscription.display_name, subscription.subscription_id, error
                    ));
                    enumeration.failures.push(SubscriptionFailure {
                        subscription_id: subscription.subscription_id.clone(),
                        display_name: subscription.display_name.clone(),
                        error,
                    });
                }
            }
        }

        enumeration
    }
}
