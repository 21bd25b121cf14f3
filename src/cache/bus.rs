//! Publish/subscribe channel telling views that cached data went stale.

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, trace};

/// Events a subscriber can fall behind by before older ones are dropped.
const CAPACITY: usize = 64;

/// Why cached data was invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
  Created(i64),
  Updated(i64),
  Deleted(i64),
}

/// Fan-out invalidation bus.
///
/// Each publish reaches every subscription alive at that moment exactly once.
/// Subscriptions taken later never see earlier publishes.
#[derive(Clone)]
pub struct InvalidationBus {
  sender: broadcast::Sender<Invalidation>,
}

impl Default for InvalidationBus {
  fn default() -> Self {
    let (sender, _) = broadcast::channel(CAPACITY);
    Self { sender }
  }
}

impl InvalidationBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start listening. Dropping the returned subscription unsubscribes.
  #[must_use = "dropping the subscription unsubscribes immediately"]
  pub fn subscribe(&self) -> Subscription {
    Subscription {
      receiver: self.sender.subscribe(),
    }
  }

  /// Notify every current subscriber. Returns how many were notified.
  pub fn publish(&self, event: Invalidation) -> usize {
    match self.sender.send(event) {
      Ok(subscribers) => {
        debug!(?event, subscribers, "published invalidation");
        subscribers
      }
      Err(_) => {
        trace!(?event, "no subscribers for invalidation");
        0
      }
    }
  }
}

/// A view's end of the bus.
#[derive(Debug)]
pub struct Subscription {
  receiver: broadcast::Receiver<Invalidation>,
}

impl Subscription {
  /// Take everything published since the last call, without waiting.
  ///
  /// Returns `None` when nothing happened. A subscriber that fell behind
  /// still gets `Some`, holding whatever events remain buffered.
  pub fn drain(&mut self) -> Option<Vec<Invalidation>> {
    let mut events = Vec::new();
    let mut lagged = false;
    loop {
      match self.receiver.try_recv() {
        Ok(event) => events.push(event),
        Err(TryRecvError::Lagged(missed)) => {
          debug!(missed, "invalidation subscriber fell behind");
          lagged = true;
        }
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }
    (lagged || !events.is_empty()).then_some(events)
  }
}
