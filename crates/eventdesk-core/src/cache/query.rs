//! In-memory query cache shared by every view of the events screen.
//!
//! Results are keyed by `(resource, page)`. A cached value stays readable after
//! it goes stale or is invalidated, so callers can keep showing it as
//! placeholder data while a refetch is in flight. Writes to the same key are
//! last-writer-wins.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use super::manager::CachedData;

/// Resource name for pages of the events collection
pub const EVENTS: &str = "events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub resource: &'static str,
    pub page: Option<u32>,
}

impl QueryKey {
    pub fn new(resource: &'static str, page: Option<u32>) -> Self {
        Self { resource, page }
    }

    pub fn events_page(page: u32) -> Self {
        Self::new(EVENTS, Some(page))
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    cached: CachedData<T>,
    invalidated: bool,
}

/// A cached value together with whether it can be used without refetching.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    pub is_fresh: bool,
}

/// What a key held before an optimistic write, for `QueryCache::rollback`.
#[derive(Debug)]
pub struct Snapshot<T> {
    key: QueryKey,
    previous: Option<Entry<T>>,
}

impl<T> Snapshot<T> {
    pub fn key(&self) -> QueryKey {
        self.key
    }
}

/// Cheap to clone; clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct QueryCache<T> {
    entries: Arc<RwLock<HashMap<QueryKey, Entry<T>>>>,
    stale_after: Duration,
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            stale_after,
        }
    }

    fn is_fresh(&self, entry: &Entry<T>) -> bool {
        if entry.invalidated {
            return false;
        }
        match (Utc::now() - entry.cached.cached_at).to_std() {
            Ok(age) => age < self.stale_after,
            // Negative age means clock skew; treat as just written
            Err(_) => true,
        }
    }

    /// Read a key regardless of freshness
    pub async fn get(&self, key: QueryKey) -> Option<QueryState<T>> {
        let entries = self.entries.read().await;
        entries.get(&key).map(|entry| QueryState {
            data: entry.cached.data.clone(),
            cached_at: entry.cached.cached_at,
            is_fresh: self.is_fresh(entry),
        })
    }

    /// Read a key only if it can be used without refetching
    pub async fn get_fresh(&self, key: QueryKey) -> Option<T> {
        self.get(key).await.filter(|s| s.is_fresh).map(|s| s.data)
    }

    pub async fn contains(&self, key: QueryKey) -> bool {
        self.entries.read().await.contains_key(&key)
    }

    /// Store a server result under a key, replacing whatever was there
    pub async fn set(&self, key: QueryKey, data: T) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            Entry {
                cached: CachedData::new(data),
                invalidated: false,
            },
        );
    }

    /// Return the fresh cached value, or run `fetcher` and cache its result.
    /// Failed fetches leave the cache untouched.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(data) = self.get_fresh(key).await {
            debug!(?key, "Query cache hit");
            return Ok(data);
        }

        debug!(?key, "Query cache miss, fetching");
        let data = fetcher().await?;
        self.set(key, data.clone()).await;
        Ok(data)
    }

    /// Fetch a key in the background so a later read is instant.
    /// The handle resolves to whether a fetch was stored; errors are only logged.
    pub fn prefetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> JoinHandle<bool>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let cache = self.clone();
        tokio::spawn(async move {
            if cache.get_fresh(key).await.is_some() {
                return false;
            }
            match fetcher().await {
                Ok(data) => {
                    debug!(?key, "Prefetched query");
                    cache.set(key, data).await;
                    true
                }
                Err(e) => {
                    debug!(?key, error = %e, "Prefetch failed");
                    false
                }
            }
        })
    }

    /// Mark every entry of a resource as needing a refetch. Data stays readable.
    /// Returns the number of entries marked.
    pub async fn invalidate(&self, resource: &str) -> usize {
        let mut entries = self.entries.write().await;
        let mut marked = 0;
        for (key, entry) in entries.iter_mut() {
            if key.resource == resource {
                entry.invalidated = true;
                marked += 1;
            }
        }
        debug!(resource, marked, "Invalidated queries");
        marked
    }

    /// Replace a key's value with `f(previous)`
    pub async fn update<F>(&self, key: QueryKey, f: F)
    where
        F: FnOnce(Option<T>) -> T,
    {
        let mut entries = self.entries.write().await;
        let previous = entries.remove(&key);
        let invalidated = previous.as_ref().map(|e| e.invalidated).unwrap_or(false);
        let data = f(previous.map(|e| e.cached.data));
        entries.insert(
            key,
            Entry {
                cached: CachedData::new(data),
                invalidated,
            },
        );
    }

    /// Apply `f` to a key and return a snapshot that `rollback` restores.
    pub async fn optimistic_update<F>(&self, key: QueryKey, f: F) -> Snapshot<T>
    where
        F: FnOnce(Option<T>) -> T,
    {
        let mut entries = self.entries.write().await;
        let previous = entries.get(&key).cloned();
        let invalidated = previous.as_ref().map(|e| e.invalidated).unwrap_or(false);
        let data = f(previous.as_ref().map(|e| e.cached.data.clone()));
        entries.insert(
            key,
            Entry {
                cached: CachedData::new(data),
                invalidated,
            },
        );
        Snapshot { key, previous }
    }

    /// Undo an optimistic write
    pub async fn rollback(&self, snapshot: Snapshot<T>) {
        let mut entries = self.entries.write().await;
        match snapshot.previous {
            Some(entry) => {
                entries.insert(snapshot.key, entry);
            }
            None => {
                entries.remove(&snapshot.key);
            }
        }
        debug!(key = ?snapshot.key, "Rolled back optimistic update");
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> QueryCache<Vec<u32>> {
        QueryCache::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_fetch_caches_result() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let data = cache
                .fetch(QueryKey::events_page(1), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(data, vec![1, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_cache_empty() {
        let cache = cache();
        let result = cache
            .fetch(QueryKey::events_page(1), || async { Err(anyhow::anyhow!("boom")) })
            .await;
        assert!(result.is_err());
        assert!(!cache.contains(QueryKey::events_page(1)).await);
    }

    #[tokio::test]
    async fn test_invalidate_keeps_data_but_forces_refetch() {
        let cache = cache();
        cache.set(QueryKey::events_page(1), vec![1]).await;
        cache.set(QueryKey::events_page(2), vec![2]).await;
        cache.set(QueryKey::new("other", None), vec![9]).await;

        assert_eq!(cache.invalidate(EVENTS).await, 2);

        let state = cache.get(QueryKey::events_page(1)).await.unwrap();
        assert_eq!(state.data, vec![1]);
        assert!(!state.is_fresh);
        assert!(cache.get_fresh(QueryKey::events_page(2)).await.is_none());
        assert_eq!(cache.get_fresh(QueryKey::new("other", None)).await, Some(vec![9]));

        let data = cache
            .fetch(QueryKey::events_page(1), || async { Ok(vec![10]) })
            .await
            .unwrap();
        assert_eq!(data, vec![10]);
        assert!(cache.get(QueryKey::events_page(1)).await.unwrap().is_fresh);
    }

    #[tokio::test]
    async fn test_zero_stale_time_always_refetches() {
        let cache: QueryCache<Vec<u32>> = QueryCache::new(Duration::ZERO);
        cache.set(QueryKey::events_page(1), vec![1]).await;
        assert!(cache.get_fresh(QueryKey::events_page(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_prefetch_populates_cache() {
        let cache = cache();
        let handle = cache.prefetch(QueryKey::events_page(2), || async { Ok(vec![6, 7]) });
        assert!(handle.await.unwrap());
        assert_eq!(cache.get_fresh(QueryKey::events_page(2)).await, Some(vec![6, 7]));

        // Already fresh: nothing to do
        let handle = cache.prefetch(QueryKey::events_page(2), || async { Ok(vec![0]) });
        assert!(!handle.await.unwrap());
        assert_eq!(cache.get_fresh(QueryKey::events_page(2)).await, Some(vec![6, 7]));
    }

    #[tokio::test]
    async fn test_prefetch_error_is_swallowed() {
        let cache = cache();
        let handle = cache.prefetch(QueryKey::events_page(3), || async {
            Err(anyhow::anyhow!("offline"))
        });
        assert!(!handle.await.unwrap());
        assert!(!cache.contains(QueryKey::events_page(3)).await);
    }

    #[tokio::test]
    async fn test_optimistic_update_and_rollback() {
        let cache = cache();
        cache.set(QueryKey::events_page(1), vec![1, 2]).await;

        let snapshot = cache
            .optimistic_update(QueryKey::events_page(1), |old| {
                let mut data = old.unwrap_or_default();
                data.push(3);
                data
            })
            .await;
        assert_eq!(snapshot.key(), QueryKey::events_page(1));
        assert_eq!(cache.get_fresh(QueryKey::events_page(1)).await, Some(vec![1, 2, 3]));

        cache.rollback(snapshot).await;
        assert_eq!(cache.get_fresh(QueryKey::events_page(1)).await, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_rollback_of_new_key_removes_it() {
        let cache = cache();
        let snapshot = cache
            .optimistic_update(QueryKey::events_page(4), |_| vec![42])
            .await;
        assert!(cache.contains(QueryKey::events_page(4)).await);
        cache.rollback(snapshot).await;
        assert!(!cache.contains(QueryKey::events_page(4)).await);
    }

    #[tokio::test]
    async fn test_update_preserves_invalidation() {
        let cache = cache();
        cache.set(QueryKey::events_page(1), vec![1]).await;
        cache.invalidate(EVENTS).await;
        cache
            .update(QueryKey::events_page(1), |old| {
                let mut data = old.unwrap_or_default();
                data.push(2);
                data
            })
            .await;
        let state = cache.get(QueryKey::events_page(1)).await.unwrap();
        assert_eq!(state.data, vec![1, 2]);
        assert!(!state.is_fresh);
    }
}
