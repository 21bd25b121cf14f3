//! Async query abstraction for data fetching.
//!
//! A `Query<T>` owns a fetcher closure and runs it on the tokio runtime.
//! Results come back over a channel that the owner polls, so a query that
//! is dropped (or refetched) while a fetch is in flight simply never sees
//! the late result.
//!
//! # Example
//!
//! ```ignore
//! let service = service.clone();
//! let mut query = Query::new(move || {
//!     let service = service.clone();
//!     async move { service.list(false).await.map_err(|e| e.to_string()) }
//! });
//!
//! query.fetch();
//!
//! // In a loop tick
//! if query.poll() {
//!     // State changed
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::trace;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn data_mut(&mut self) -> Option<&mut T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query with loading/success/error state.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query. The fetcher is called on every `fetch()` or `refetch()`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Mutable access to settled data, for local edits such as removing a deleted row.
  pub fn data_mut(&mut self) -> Option<&mut T> {
    self.state.data_mut()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Start fetching data if not already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch. A fetch already in flight is abandoned.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for results from a pending fetch without blocking.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = self.receiver.as_mut() else {
      return false;
    };

    match receiver.try_recv() {
      Ok(result) => self.finish(Some(result)),
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => self.finish(None),
    }
  }

  /// Wait for a pending fetch to finish. Returns immediately when idle or settled.
  pub async fn settle(&mut self) -> &QueryState<T> {
    if let Some(receiver) = self.receiver.as_mut() {
      let result = receiver.recv().await;
      self.finish(result);
    }
    &self.state
  }

  fn finish(&mut self, result: Option<Result<T, String>>) -> bool {
    self.receiver = None;
    match result {
      Some(Ok(data)) => self.state = QueryState::Success(data),
      Some(Err(error)) => self.state = QueryState::Error(error),
      // Sender dropped without sending
      None => self.state = QueryState::Error("Query was cancelled".to_string()),
    }
    true
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      if tx.send(result).is_err() {
        trace!("query result discarded, receiver dropped");
      }
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(matches!(query.state(), QueryState::Success(_)));
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("Something went wrong".to_string()) });

    query.fetch();
    query.settle().await;

    assert!(matches!(query.state(), QueryState::Error(e) if e == "Something went wrong"));
    assert_eq!(query.data(), None);
  }

  #[tokio::test]
  async fn test_settle_when_idle_returns_immediately() {
    let mut query = Query::new(|| async { Ok::<_, String>(1) });
    assert!(matches!(query.settle().await, QueryState::Idle));
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, String>(42)
      }
    });

    query.fetch();
    query.fetch();
    assert!(query.is_loading());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_cancels_pending() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    query.refetch();
    query.settle().await;

    // Only the second fetch is received
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_abandoned_fetch_never_reaches_state() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      // First call answers quickly, the replacement slowly
      let call = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        let delay = if call == 0 { 20 } else { 80 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok::<_, String>(call)
      }
    });

    query.fetch();
    query.refetch();

    // The abandoned fetch has finished by now; nothing may have arrived
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!query.poll());
    assert!(query.is_loading());

    query.settle().await;
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_dropped_query_lets_fetch_finish_quietly() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let mut query = Query::new(move || {
      let flag = flag.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        flag.store(true, Ordering::SeqCst);
        Ok::<_, String>(7)
      }
    });

    query.fetch();
    drop(query);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(finished.load(Ordering::SeqCst));
  }
}
