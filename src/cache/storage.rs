//! Cache storage trait and in-memory implementation.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

use crate::error::{Error, Result};

/// A single cached value.
///
/// Values are kept as serialized JSON. Every read deserializes a fresh copy,
/// so callers can never mutate what is cached.
#[derive(Debug, Clone)]
pub struct CachedValue {
  pub value: Value,
  pub fetched_at: DateTime<Utc>,
}

/// A typed, materialized cache hit.
#[derive(Debug, Clone)]
pub struct CachedEntry<T> {
  pub data: T,
  pub fetched_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Look up a raw entry by fingerprint.
  fn get_raw(&self, key: &str) -> Result<Option<CachedValue>>;

  /// Store a raw entry, replacing any previous one.
  fn put_raw(&self, key: &str, value: CachedValue) -> Result<()>;

  /// Remove a single entry. Returns whether something was removed.
  fn invalidate(&self, key: &str) -> Result<bool>;

  /// Remove every entry whose key starts with `<family>:`. Returns how many were removed.
  fn invalidate_family(&self, family: &str) -> Result<usize>;

  /// Remove everything.
  fn clear(&self) -> Result<()>;

  /// Typed lookup.
  fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CachedEntry<T>>>
  where
    Self: Sized,
  {
    match self.get_raw(key)? {
      Some(cached) => {
        let data = serde_json::from_value(cached.value)?;
        Ok(Some(CachedEntry {
          data,
          fetched_at: cached.fetched_at,
        }))
      }
      None => Ok(None),
    }
  }

  /// Typed store, stamped with the current time.
  fn put<T: Serialize>(&self, key: &str, data: &T) -> Result<DateTime<Utc>>
  where
    Self: Sized,
  {
    let fetched_at = Utc::now();
    let value = serde_json::to_value(data)?;
    self.put_raw(key, CachedValue { value, fetched_at })?;
    Ok(fetched_at)
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get_raw(&self, _key: &str) -> Result<Option<CachedValue>> {
    Ok(None) // Always miss
  }

  fn put_raw(&self, _key: &str, _value: CachedValue) -> Result<()> {
    Ok(()) // Discard
  }

  fn invalidate(&self, _key: &str) -> Result<bool> {
    Ok(false)
  }

  fn invalidate_family(&self, _family: &str) -> Result<usize> {
    Ok(0)
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// Process-wide in-memory cache.
///
/// Readers share the lock, so concurrent reads never wait on each other.
/// The lock is held only for the map operation itself.
#[derive(Default)]
pub struct MemoryStorage {
  entries: RwLock<HashMap<String, CachedValue>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

fn poisoned<E: std::fmt::Display>(e: E) -> Error {
  Error::Cache {
    message: format!("Lock poisoned: {}", e),
  }
}

impl CacheStorage for MemoryStorage {
  fn get_raw(&self, key: &str) -> Result<Option<CachedValue>> {
    let entries = self.entries.read().map_err(poisoned)?;
    Ok(entries.get(key).cloned())
  }

  fn put_raw(&self, key: &str, value: CachedValue) -> Result<()> {
    let mut entries = self.entries.write().map_err(poisoned)?;
    entries.insert(key.to_string(), value);
    trace!(key, "cache entry stored");
    Ok(())
  }

  fn invalidate(&self, key: &str) -> Result<bool> {
    let mut entries = self.entries.write().map_err(poisoned)?;
    Ok(entries.remove(key).is_some())
  }

  fn invalidate_family(&self, family: &str) -> Result<usize> {
    let prefix = format!("{}:", family);
    let mut entries = self.entries.write().map_err(poisoned)?;
    let before = entries.len();
    entries.retain(|key, _| !key.starts_with(&prefix));
    Ok(before - entries.len())
  }

  fn clear(&self) -> Result<()> {
    let mut entries = self.entries.write().map_err(poisoned)?;
    entries.clear();
    Ok(())
  }
}

/// Storage picked at startup from configuration.
pub enum ConfiguredStorage {
  Memory(MemoryStorage),
  Disabled(NoopStorage),
}

impl ConfiguredStorage {
  pub fn new(enabled: bool) -> Self {
    if enabled {
      ConfiguredStorage::Memory(MemoryStorage::new())
    } else {
      ConfiguredStorage::Disabled(NoopStorage)
    }
  }

  fn inner(&self) -> &dyn CacheStorage {
    match self {
      ConfiguredStorage::Memory(s) => s,
      ConfiguredStorage::Disabled(s) => s,
    }
  }
}

impl CacheStorage for ConfiguredStorage {
  fn get_raw(&self, key: &str) -> Result<Option<CachedValue>> {
    self.inner().get_raw(key)
  }

  fn put_raw(&self, key: &str, value: CachedValue) -> Result<()> {
    self.inner().put_raw(key, value)
  }

  fn invalidate(&self, key: &str) -> Result<bool> {
    self.inner().invalidate(key)
  }

  fn invalidate_family(&self, family: &str) -> Result<usize> {
    self.inner().invalidate_family(family)
  }

  fn clear(&self) -> Result<()> {
    self.inner().clear()
  }
}
