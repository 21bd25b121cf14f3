//! Generic read cache for data fetched from the backend.
//!
//! This module is entity-agnostic:
//! - Stores query results under canonical fingerprints
//! - Serves cached reads that fail soft and fresh reads that fail loud
//! - Evicts by key, by entity family, or entirely
//! - Broadcasts invalidations so views holding results can refresh

mod bus;
mod layer;
pub mod storage;
mod traits;

pub use bus::{Invalidation, InvalidationBus, Subscription};
pub use layer::CacheLayer;
pub use storage::{CacheStorage, ConfiguredStorage};
pub use traits::{CacheResult, CacheSource, QueryKey};
