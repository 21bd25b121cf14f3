//! Cached policy client that wraps PolicyClient with a read cache and
//! invalidation broadcasts.

use tracing::info;

use crate::cache::{
  CacheLayer, CacheResult, CacheStorage, ConfiguredStorage, Invalidation, InvalidationBus,
};
use crate::config::Config;
use crate::error::Result;

use super::cache::{PolicyQueryKey, POLICY_FAMILY};
use super::client::PolicyClient;
use super::filter::BuiltQuery;
use super::types::{PolicyDraft, PolicyRecord};

/// Policy client with transparent caching.
///
/// Every read comes in two flavours: the plain method consults the cache
/// first and falls back to an empty result when the backend fails; the
/// `_fresh` method always calls the backend, refreshes the cache and reports
/// failures. Writes bypass the cache and invalidate the whole policy family
/// on success.
pub struct CachedPolicyClient<S: CacheStorage = ConfiguredStorage> {
  inner: PolicyClient,
  cache: CacheLayer<S>,
  bus: InvalidationBus,
}

impl CachedPolicyClient {
  /// Create a cached client from configuration.
  pub fn new(config: &Config) -> Result<Self> {
    let inner = PolicyClient::new(&config.api)?;
    let storage = ConfiguredStorage::new(config.cache.enabled);
    let cache = CacheLayer::new(storage).with_max_age(config.cache.max_age());

    Ok(Self::with_parts(inner, cache, InvalidationBus::new()))
  }
}

impl<S: CacheStorage> CachedPolicyClient<S> {
  pub fn with_parts(inner: PolicyClient, cache: CacheLayer<S>, bus: InvalidationBus) -> Self {
    Self { inner, cache, bus }
  }

  /// Bus that announces every successful mutation.
  pub fn bus(&self) -> &InvalidationBus {
    &self.bus
  }

  pub fn base_url(&self) -> &str {
    self.inner.base_url()
  }

  /// List every policy, cache first.
  pub async fn get_all(&self) -> CacheResult<Vec<PolicyRecord>> {
    self
      .cache
      .fetch(&PolicyQueryKey::All, || self.inner.get_all())
      .await
  }

  /// List every policy from the backend.
  pub async fn get_all_fresh(&self) -> Result<CacheResult<Vec<PolicyRecord>>> {
    self
      .cache
      .fetch_fresh(&PolicyQueryKey::All, || self.inner.get_all())
      .await
  }

  /// Look up by id, cache first.
  pub async fn get_by_id(&self, id: i64) -> CacheResult<Option<PolicyRecord>> {
    self
      .cache
      .fetch(&PolicyQueryKey::ById { id }, || self.inner.get_by_id(id))
      .await
  }

  /// Look up by id from the backend.
  pub async fn get_by_id_fresh(&self, id: i64) -> Result<CacheResult<Option<PolicyRecord>>> {
    self
      .cache
      .fetch_fresh(&PolicyQueryKey::ById { id }, || self.inner.get_by_id(id))
      .await
  }

  /// Look up by policy number, cache first.
  pub async fn get_by_policy_number(&self, policy_number: &str) -> CacheResult<Option<PolicyRecord>> {
    let key = PolicyQueryKey::ByNumber {
      policy_number: policy_number.to_string(),
    };
    self
      .cache
      .fetch(&key, || self.inner.get_by_policy_number(policy_number))
      .await
  }

  /// Look up by policy number from the backend.
  pub async fn get_by_policy_number_fresh(
    &self,
    policy_number: &str,
  ) -> Result<CacheResult<Option<PolicyRecord>>> {
    let key = PolicyQueryKey::ByNumber {
      policy_number: policy_number.to_string(),
    };
    self
      .cache
      .fetch_fresh(&key, || self.inner.get_by_policy_number(policy_number))
      .await
  }

  /// Filtered search, cache first.
  pub async fn get_filtered(&self, query: &BuiltQuery) -> CacheResult<Vec<PolicyRecord>> {
    self
      .cache
      .fetch(&PolicyQueryKey::filter(query), || self.inner.get_filtered(query))
      .await
  }

  /// Filtered search from the backend.
  pub async fn get_filtered_fresh(&self, query: &BuiltQuery) -> Result<CacheResult<Vec<PolicyRecord>>> {
    self
      .cache
      .fetch_fresh(&PolicyQueryKey::filter(query), || {
        self.inner.get_filtered(query)
      })
      .await
  }

  /// Create a policy (not cached - write operation).
  pub async fn create(&self, draft: &PolicyDraft) -> Result<PolicyRecord> {
    draft.validate()?;
    let created = self.inner.create(draft).await?;
    info!(id = created.id, policy_number = %created.policy_number, "policy created");
    self.invalidate(Invalidation::Created(created.id));
    Ok(created)
  }

  /// Update a policy (not cached - write operation).
  pub async fn update(&self, id: i64, draft: &PolicyDraft) -> Result<PolicyRecord> {
    draft.validate()?;
    let updated = self.inner.update(id, draft).await?;
    info!(id, "policy updated");
    self.invalidate(Invalidation::Updated(id));
    Ok(updated)
  }

  /// Delete a policy (not cached - write operation).
  pub async fn delete(&self, id: i64) -> Result<()> {
    self.inner.delete(id).await?;
    info!(id, "policy deleted");
    self.invalidate(Invalidation::Deleted(id));
    Ok(())
  }

  /// Drop every cached policy read and tell subscribers.
  fn invalidate(&self, reason: Invalidation) {
    self.cache.invalidate_family(POLICY_FAMILY);
    self.bus.publish(reason);
  }
}
