//! Clients wired to a wiremock server, with in-memory caching.

use wiremock::MockServer;

use crate::cache::storage::MemoryStorage;
use crate::cache::{CacheLayer, InvalidationBus};
use crate::config::ApiConfig;

use super::cached_client::CachedPolicyClient;
use super::client::PolicyClient;
use super::service::PolicyService;

pub fn cached_client(server: &MockServer) -> CachedPolicyClient<MemoryStorage> {
  let inner = PolicyClient::new(&ApiConfig {
    url: format!("{}/api/v1/policies", server.uri()),
    timeout_secs: 5,
  })
  .unwrap();
  CachedPolicyClient::with_parts(
    inner,
    CacheLayer::new(MemoryStorage::new()),
    InvalidationBus::new(),
  )
}

pub fn service(server: &MockServer) -> PolicyService<MemoryStorage> {
  PolicyService::new(cached_client(server))
}
