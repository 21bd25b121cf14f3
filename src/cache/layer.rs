//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::{CacheStorage, CachedEntry};
use super::traits::{CacheResult, Cacheable, QueryKey};
use crate::error::Result;

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client. Entries
/// never expire on their own unless a max age is configured; callers decide
/// when to force a refresh through [`CacheLayer::fetch_fresh`].
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// Entries older than this are treated as misses
  max_age: Option<Duration>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      max_age: None,
    }
  }

  /// Set the max age for cached data.
  pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
    self.max_age = max_age;
    self
  }

  fn is_expired(&self, fetched_at: DateTime<Utc>) -> bool {
    match self.max_age {
      Some(max_age) => Utc::now() - fetched_at > max_age,
      None => false,
    }
  }

  fn lookup<T: Cacheable>(&self, fingerprint: &str) -> Option<CachedEntry<T>> {
    match self.storage.get::<T>(fingerprint) {
      Ok(hit) => hit,
      Err(e) => {
        warn!(key = fingerprint, error = %e, "cache read failed, treating as miss");
        None
      }
    }
  }

  fn store<T: Cacheable>(&self, fingerprint: &str, data: &T) -> DateTime<Utc> {
    let result = if data.should_store() {
      self.storage.put(fingerprint, data)
    } else {
      // A lookup that found nothing must not leave an older hit behind
      self.storage.invalidate(fingerprint).map(|_| Utc::now())
    };

    result.unwrap_or_else(|e| {
      warn!(key = fingerprint, error = %e, "cache write failed");
      Utc::now()
    })
  }

  /// Cache-first read that never fails.
  ///
  /// 1. Live cache entry: return it without touching the network
  /// 2. Otherwise fetch, store the result and return it
  /// 3. On fetch failure, serve an expired entry if there is one (offline mode)
  /// 4. Otherwise return the empty value
  pub async fn fetch<K, T, F, Fut>(&self, key: &K, fetcher: F) -> CacheResult<T>
  where
    K: QueryKey,
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let fingerprint = key.fingerprint();
    let cached = match self.lookup::<T>(&fingerprint) {
      Some(entry) if !self.is_expired(entry.fetched_at) => {
        debug!(key = %fingerprint, family = key.family(), "cache hit");
        return CacheResult::from_cache(entry.data, entry.fetched_at);
      }
      other => other,
    };

    debug!(key = %fingerprint, query = %key.description(), "cache miss, fetching");
    match fetcher().await {
      Ok(data) => {
        let fetched_at = self.store(&fingerprint, &data);
        CacheResult::from_network(data, fetched_at)
      }
      Err(e) => match cached {
        Some(entry) => {
          warn!(query = %key.description(), error = %e, "fetch failed, serving expired cache entry");
          CacheResult::offline(entry.data, entry.fetched_at)
        }
        None => {
          warn!(query = %key.description(), error = %e, "fetch failed, returning empty result");
          CacheResult::unavailable(T::default())
        }
      },
    }
  }

  /// Network-first read: always fetches, overwrites the cache entry, and
  /// propagates failures.
  pub async fn fetch_fresh<K, T, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>>
  where
    K: QueryKey,
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let fingerprint = key.fingerprint();
    debug!(key = %fingerprint, query = %key.description(), "fresh fetch");

    let data = fetcher().await?;
    let fetched_at = self.store(&fingerprint, &data);
    Ok(CacheResult::from_network(data, fetched_at))
  }

  /// Evict every entry of an entity family. Returns the number of evicted entries.
  pub fn invalidate_family(&self, family: &str) -> usize {
    match self.storage.invalidate_family(family) {
      Ok(evicted) => {
        debug!(family, evicted, "cache family invalidated");
        evicted
      }
      Err(e) => {
        // Cannot prove anything was evicted; drop everything instead.
        warn!(family, error = %e, "family eviction failed, clearing cache");
        if let Err(e) = self.storage.clear() {
          warn!(error = %e, "cache clear failed");
        }
        0
      }
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      max_age: self.max_age,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStorage;
  use crate::error::Error;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct TestKey(&'static str);

  impl QueryKey for TestKey {
    fn fingerprint(&self) -> String {
      format!("test:{}", self.0)
    }

    fn family(&self) -> &'static str {
      "test"
    }

    fn description(&self) -> String {
      self.0.to_string()
    }
  }

  fn failing() -> Error {
    Error::Http {
      status: 503,
      body: "down".to_string(),
    }
  }

  #[tokio::test]
  async fn test_second_fetch_is_served_from_cache() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let result: CacheResult<Vec<i32>> = layer
        .fetch(&TestKey("all"), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(vec![1, 2])
        })
        .await;
      assert_eq!(result.data, vec![1, 2]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_fresh_always_fetches_and_overwrites() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let _: CacheResult<Vec<i32>> = layer.fetch(&TestKey("all"), || async { Ok(vec![1]) }).await;

    let fresh = layer
      .fetch_fresh(&TestKey("all"), || async { Ok(vec![1, 2, 3]) })
      .await
      .unwrap();
    assert_eq!(fresh.source, crate::cache::CacheSource::Network);

    let cached: CacheResult<Vec<i32>> = layer.fetch(&TestKey("all"), || async { Ok(vec![]) }).await;
    assert_eq!(cached.data, vec![1, 2, 3]);
    assert_eq!(cached.source, crate::cache::CacheSource::Cache);
  }

  #[tokio::test]
  async fn test_cached_failure_returns_empty() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let result: CacheResult<Vec<i32>> = layer
      .fetch(&TestKey("all"), || async { Err(failing()) })
      .await;
    assert!(result.data.is_empty());
    assert_eq!(result.source, crate::cache::CacheSource::Unavailable);

    let single: CacheResult<Option<i32>> = layer
      .fetch(&TestKey("one"), || async { Err(failing()) })
      .await;
    assert_eq!(single.data, None);
  }

  #[tokio::test]
  async fn test_fresh_failure_propagates() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let result: Result<CacheResult<Vec<i32>>> = layer
      .fetch_fresh(&TestKey("all"), || async { Err(failing()) })
      .await;
    assert!(matches!(result, Err(Error::Http { status: 503, .. })));
  }

  #[tokio::test]
  async fn test_not_found_is_not_cached() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let _: CacheResult<Option<i32>> = layer
        .fetch(&TestKey("missing"), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(None)
        })
        .await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_expired_entry_served_offline_when_fetch_fails() {
    let layer = CacheLayer::new(MemoryStorage::new()).with_max_age(Some(Duration::zero()));
    let _: CacheResult<Vec<i32>> = layer.fetch(&TestKey("all"), || async { Ok(vec![9]) }).await;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let result: CacheResult<Vec<i32>> = layer
      .fetch(&TestKey("all"), || async { Err(failing()) })
      .await;
    assert_eq!(result.data, vec![9]);
    assert_eq!(result.source, crate::cache::CacheSource::Offline);
  }

  #[tokio::test]
  async fn test_invalidate_family_forces_refetch() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let _: CacheResult<Vec<i32>> = layer.fetch(&TestKey("all"), || async { Ok(vec![1]) }).await;

    assert_eq!(layer.invalidate_family("test"), 1);
    let result: CacheResult<Vec<i32>> = layer.fetch(&TestKey("all"), || async { Ok(vec![2]) }).await;
    assert_eq!(result.data, vec![2]);
    assert_eq!(result.source, crate::cache::CacheSource::Network);
  }
}
