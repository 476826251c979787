//! Caching for event pages.
//!
//! - `QueryCache`: the shared in-memory cache keyed by `(resource, page)`,
//!   with staleness, invalidation, prefetch and optimistic writes
//! - `CacheManager`: JSON snapshots on disk so the table has data at startup

pub mod manager;
pub mod query;

pub use manager::{CacheManager, CachedData};
pub use query::{QueryCache, QueryKey, QueryState, Snapshot, EVENTS};
