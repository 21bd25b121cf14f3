//! Search view model: last request, in-flight query, sort state and a bus
//! subscription that marks results stale when policies change.

use tracing::debug;

use crate::cache::{CacheStorage, ConfiguredStorage, Subscription};
use crate::error::Result;
use crate::policy::service::{DeleteOutcome, PolicyService, SearchOutcome, SearchRequest};
use crate::policy::types::PolicyRecord;
use crate::query::{Query, QueryState};
use crate::sort::{SortField, SortState};

pub struct SearchSession<S: CacheStorage + 'static = ConfiguredStorage> {
  service: PolicyService<S>,
  request: Option<SearchRequest>,
  query: Option<Query<SearchOutcome>>,
  sort: SortState,
  invalidations: Subscription,
}

impl<S: CacheStorage + 'static> SearchSession<S> {
  pub fn new(service: PolicyService<S>) -> Self {
    let invalidations = service.bus().subscribe();
    Self {
      service,
      request: None,
      query: None,
      sort: SortState::default(),
      invalidations,
    }
  }

  pub fn sort_state(&self) -> SortState {
    self.sort
  }

  /// Start a new search. Any search still in flight is abandoned.
  pub fn search(&mut self, request: SearchRequest) {
    self.start(request.clone());
    self.request = Some(request);
  }

  /// Re-run the last search against the backend, bypassing the cache.
  pub fn refresh(&mut self) -> bool {
    let Some(mut request) = self.request.clone() else {
      return false;
    };
    request.fresh = true;
    self.start(request);
    true
  }

  /// Forget the request and its results.
  pub fn clear(&mut self) {
    self.request = None;
    self.query = None;
  }

  fn start(&mut self, request: SearchRequest) {
    let service = self.service.clone();
    let mut query = Query::new(move || {
      let service = service.clone();
      let request = request.clone();
      async move { service.search(&request).await.map_err(|e| e.to_string()) }
    });
    query.fetch();
    // Replacing the old query drops its receiver, so a late result is discarded.
    self.query = Some(query);
  }

  /// Poll the query and react to invalidations. Returns `true` if anything changed.
  pub fn tick(&mut self) -> bool {
    let mut changed = false;
    if let Some(query) = self.query.as_mut() {
      if query.poll() {
        changed = true;
        self.resort();
      }
    }

    // Always drain, so invalidations seen while idle are not replayed later
    let Some(events) = self.invalidations.drain() else {
      return changed;
    };
    if self.outcome().is_some_and(|o| !o.is_empty()) {
      if let Some(query) = self.query.as_mut() {
        debug!(?events, "results invalidated, refetching");
        query.refetch();
        changed = true;
      }
    }
    changed
  }

  /// Wait for the in-flight search, then apply the current sort.
  pub async fn settle(&mut self) -> Option<&QueryState<SearchOutcome>> {
    let query = self.query.as_mut()?;
    query.settle().await;
    self.resort();
    self.query.as_ref().map(Query::state)
  }

  pub fn is_loading(&self) -> bool {
    self.query.as_ref().is_some_and(Query::is_loading)
  }

  pub fn outcome(&self) -> Option<&SearchOutcome> {
    self.query.as_ref().and_then(Query::data)
  }

  /// Current results in display order. Empty while loading or on error.
  pub fn records(&self) -> &[PolicyRecord] {
    self.outcome().map(|o| o.records.as_slice()).unwrap_or_default()
  }

  /// Toggle the sort on `field` and reorder the current results.
  pub fn sort_by(&mut self, field: SortField) {
    self.sort.toggle(field);
    self.resort();
  }

  fn resort(&mut self) {
    let sort = self.sort;
    if let Some(outcome) = self.query.as_mut().and_then(Query::data_mut) {
      outcome.records = sort.apply(&outcome.records);
    }
  }

  /// Delete through the facade and drop the row from the current results.
  pub async fn delete(&mut self, id: i64, confirmed: bool) -> Result<DeleteOutcome> {
    let outcome = self.service.delete(id, confirmed).await?;
    if outcome == DeleteOutcome::Deleted {
      if let Some(results) = self.query.as_mut().and_then(Query::data_mut) {
        results.records.retain(|r| r.id != id);
      }
    }
    Ok(outcome)
  }
}
