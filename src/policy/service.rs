//! Policy CRUD facade: search precedence, listing, and the write paths.

use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheResult, CacheSource, CacheStorage, ConfiguredStorage, InvalidationBus};
use crate::error::{Result, ValidationError};

use super::cached_client::CachedPolicyClient;
use super::filter::{build, FilterCriteria};
use super::types::{PolicyDraft, PolicyRecord};

/// Which lookup a search ended up running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
  ById,
  ByPolicyNumber,
  Filtered,
}

/// A search as entered by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
  /// Raw id text; blank means unset
  pub id: Option<String>,
  pub filters: FilterCriteria,
  /// Bypass the cache and surface backend failures
  pub fresh: bool,
}

impl SearchRequest {
  pub fn with_filters(filters: FilterCriteria) -> Self {
    Self {
      filters,
      ..Default::default()
    }
  }

  /// Parsed id, if one was entered.
  pub fn parsed_id(&self) -> std::result::Result<Option<i64>, ValidationError> {
    match self.id.as_deref().map(str::trim) {
      None | Some("") => Ok(None),
      Some(raw) => raw
        .parse::<i64>()
        .map(Some)
        .map_err(|_| ValidationError::InvalidValue {
          field: "id",
          value: raw.to_string(),
        }),
    }
  }

  /// Policy number filter, if non-blank.
  pub fn policy_number(&self) -> Option<&str> {
    self
      .filters
      .policy_number
      .as_deref()
      .map(str::trim)
      .filter(|n| !n.is_empty())
  }

  /// Which lookup this request resolves to. Id beats policy number beats filters.
  pub fn strategy(&self) -> std::result::Result<SearchStrategy, ValidationError> {
    if self.parsed_id()?.is_some() {
      Ok(SearchStrategy::ById)
    } else if self.policy_number().is_some() {
      Ok(SearchStrategy::ByPolicyNumber)
    } else {
      Ok(SearchStrategy::Filtered)
    }
  }
}

/// Result of a search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
  pub records: Vec<PolicyRecord>,
  pub strategy: SearchStrategy,
  pub source: CacheSource,
  pub fetched_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SearchOutcome {
  fn from_result(result: CacheResult<Vec<PolicyRecord>>, strategy: SearchStrategy) -> Self {
    Self {
      records: result.data,
      strategy,
      source: result.source,
      fetched_at: result.fetched_at,
    }
  }

  pub fn age(&self) -> Option<chrono::Duration> {
    self.fetched_at.map(|t| chrono::Utc::now() - t)
  }

  /// The "no results" signal. Not an error.
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

/// Outcome of a gated delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
  Deleted,
  /// The user declined; nothing was sent
  Declined,
}

/// Facade over the cached client used by every front end.
pub struct PolicyService<S: CacheStorage = ConfiguredStorage> {
  client: Arc<CachedPolicyClient<S>>,
}

impl<S: CacheStorage> Clone for PolicyService<S> {
  fn clone(&self) -> Self {
    Self {
      client: Arc::clone(&self.client),
    }
  }
}

impl<S: CacheStorage> PolicyService<S> {
  pub fn new(client: CachedPolicyClient<S>) -> Self {
    Self {
      client: Arc::new(client),
    }
  }

  pub fn bus(&self) -> &InvalidationBus {
    self.client.bus()
  }

  pub fn base_url(&self) -> &str {
    self.client.base_url()
  }

  /// Run a search with id > policy number > filters precedence.
  ///
  /// Cached searches never fail on backend errors; fresh searches do.
  pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
    let strategy = request.strategy()?;
    let fresh = request.fresh;
    debug!(?strategy, fresh, "running search");

    let result = match strategy {
      SearchStrategy::ById => {
        let id = request.parsed_id()?.unwrap_or_default();
        let single = if fresh {
          self.client.get_by_id_fresh(id).await?
        } else {
          self.client.get_by_id(id).await
        };
        single.map(|p| p.into_iter().collect::<Vec<_>>())
      }
      SearchStrategy::ByPolicyNumber => {
        let number = request.policy_number().unwrap_or_default();
        let single = if fresh {
          self.client.get_by_policy_number_fresh(number).await?
        } else {
          self.client.get_by_policy_number(number).await
        };
        single.map(|p| p.into_iter().collect::<Vec<_>>())
      }
      SearchStrategy::Filtered => {
        let query = build(&request.filters);
        if fresh {
          self.client.get_filtered_fresh(&query).await?
        } else {
          self.client.get_filtered(&query).await
        }
      }
    };

    Ok(SearchOutcome::from_result(result, strategy))
  }

  /// Every policy.
  pub async fn list(&self, fresh: bool) -> Result<CacheResult<Vec<PolicyRecord>>> {
    if fresh {
      self.client.get_all_fresh().await
    } else {
      Ok(self.client.get_all().await)
    }
  }

  /// A single policy, read fresh (used before editing).
  pub async fn get(&self, id: i64) -> Result<Option<PolicyRecord>> {
    Ok(self.client.get_by_id_fresh(id).await?.data)
  }

  pub async fn create(&self, draft: &PolicyDraft) -> Result<PolicyRecord> {
    self.client.create(draft).await
  }

  /// Edit flow: load the current record, overlay `changes`, validate, save.
  ///
  /// Returns `Ok(None)` when the policy does not exist.
  pub async fn update(&self, id: i64, changes: PolicyDraft) -> Result<Option<PolicyRecord>> {
    let Some(current) = self.get(id).await? else {
      return Ok(None);
    };
    let mut draft = PolicyDraft::from(current);
    draft.apply(changes);
    self.client.update(id, &draft).await.map(Some)
  }

  /// Delete once the user confirmed. Declining never touches the backend.
  pub async fn delete(&self, id: i64, confirmed: bool) -> Result<DeleteOutcome> {
    if !confirmed {
      info!(id, "delete declined");
      return Ok(DeleteOutcome::Declined);
    }
    self.client.delete(id).await?;
    Ok(DeleteOutcome::Deleted)
  }
}
