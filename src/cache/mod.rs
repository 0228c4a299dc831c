//! Local caching layer for catalog data.
//!
//! This module provides the storage side of the cache-aside flow:
//! - `PageStore` / `SqliteStore`: durable keyed storage of pages and entities
//! - `FreshnessTracker`: per-entity-class last-write timestamps with a
//!   refresh window, so stale data is transparently refetched

pub mod freshness;
pub mod storage;
pub mod traits;

pub use freshness::{Clock, EntityClass, FreshnessTracker, SystemClock};
pub use storage::SqliteStore;
pub use traits::{PageStore, TimestampStore};
