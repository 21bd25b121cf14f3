//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Trait for values the cache layer can hold.
///
/// `Default` doubles as the empty result a cached read falls back to when the
/// backend is unavailable (`[]` for lists, `None` for lookups).
pub trait Cacheable: Serialize + DeserializeOwned + Default + Send {
  /// Whether this value should be stored. Not-found lookups are not.
  fn should_store(&self) -> bool {
    true
  }
}

impl<T: Serialize + DeserializeOwned + Send> Cacheable for Vec<T> {}

impl<T: Serialize + DeserializeOwned + Send> Cacheable for Option<T> {
  fn should_store(&self) -> bool {
    self.is_some()
  }
}

/// A cacheable query.
///
/// Implementors map a logical read to a canonical fingerprint. Two logically
/// identical queries must produce the same fingerprint.
pub trait QueryKey {
  /// Canonical cache key, `<family>:<operation>[:<params>]`.
  fn fingerprint(&self) -> String;

  /// Entity family this query reads from (e.g. "policy"). Mutations evict by family.
  fn family(&self) -> &'static str;

  /// Human-readable description for logs.
  fn description(&self) -> String;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched from the backend (None when nothing was fetched)
  pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at: Some(fetched_at),
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      fetched_at: Some(fetched_at),
    }
  }

  /// Backend failed but an expired entry was still around.
  pub fn offline(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      fetched_at: Some(fetched_at),
    }
  }

  /// Backend failed and nothing was cached; `data` is the empty fallback.
  pub fn unavailable(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Unavailable,
      fetched_at: None,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      fetched_at: self.fetched_at,
    }
  }

  /// How long ago the data was fetched, if it was.
  pub fn age(&self) -> Option<chrono::Duration> {
    self.fetched_at.map(|t| Utc::now() - t)
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Served from the read cache
  Cache,
  /// Network failed, serving an entry past its max age
  Offline,
  /// Network failed and nothing was cached
  Unavailable,
}

impl CacheSource {
  pub fn label(&self) -> &'static str {
    match self {
      CacheSource::Network => "network",
      CacheSource::Cache => "cache",
      CacheSource::Offline => "offline",
      CacheSource::Unavailable => "unavailable",
    }
  }
}
