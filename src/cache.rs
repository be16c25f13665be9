//! # Query Cache
//!
//! Page-owned cache of API results keyed by [`QueryKey`].
//!
//! - Entries younger than the TTL are served without a network call.
//! - Expired entries are refetched, but their value stays readable as the
//!   last known result until the refetch succeeds.
//! - Concurrent requests for the same key share one fetch.
//! - Invalidation evicts everything and bumps a generation counter; a fetch
//!   that started under an older generation never populates the cache.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::ClientError;
use crate::query::QueryKey;

type SharedFetch<V> = Arc<OnceCell<Result<Arc<V>, ClientError>>>;

/// Where a value handed out by [`QueryCache::get_or_fetch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Fresh cache entry, no request made
    Cache,
    /// This caller performed the request
    Network,
    /// Another caller's identical in-flight request was reused
    Joined,
}

#[derive(Debug)]
pub struct Fetched<V> {
    pub value: Arc<V>,
    pub source: FetchSource,
}

/// Result of a synchronous lookup.
#[derive(Debug)]
pub enum Lookup<V> {
    Fresh(Arc<V>),
    Expired(Arc<V>),
    Missing,
}

struct CacheEntry<V> {
    value: Arc<V>,
    fetched_at: Instant,
}

struct CacheState<V> {
    entries: LruCache<QueryKey, CacheEntry<V>>,
    in_flight: HashMap<QueryKey, SharedFetch<V>>,
    generation: u64,
}

pub struct QueryCache<V> {
    ttl: Duration,
    state: Mutex<CacheState<V>>,
}

impl<V> QueryCache<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                in_flight: HashMap::new(),
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lookup(&self, key: &QueryKey) -> Lookup<V> {
        let mut state = self.lock();
        match state.entries.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => {
                Lookup::Fresh(Arc::clone(&entry.value))
            }
            Some(entry) => Lookup::Expired(Arc::clone(&entry.value)),
            None => Lookup::Missing,
        }
    }

    /// Last successful value for `key`, fresh or not.
    pub fn last_known(&self, key: &QueryKey) -> Option<Arc<V>> {
        let state = self.lock();
        state.entries.peek(key).map(|entry| Arc::clone(&entry.value))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Evict every entry and detach in-flight fetches. Returns how many entries were dropped.
    pub fn invalidate_all(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        state.generation += 1;
        dropped
    }

    /// Serve `key` from cache when fresh, otherwise run `fetch` (or join an
    /// identical request already in flight).
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &QueryKey,
        fetch: F,
    ) -> Result<Fetched<V>, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ClientError>>,
    {
        let (cell, generation) = {
            let mut state = self.lock();
            if let Some(entry) = state.entries.get(key)
                && entry.fetched_at.elapsed() < self.ttl
            {
                counter!("list_cache_hits_total").increment(1);
                return Ok(Fetched {
                    value: Arc::clone(&entry.value),
                    source: FetchSource::Cache,
                });
            }
            let generation = state.generation;
            let cell = state
                .in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone();
            (cell, generation)
        };

        let mut performed = false;
        let flag = &mut performed;
        let result = cell
            .get_or_init(move || async move {
                *flag = true;
                counter!("list_cache_misses_total").increment(1);
                fetch().await.map(Arc::new)
            })
            .await
            .clone();

        if !performed {
            counter!("list_cache_joined_total").increment(1);
            debug!(key = %key, "joined in-flight request");
            return result.map(|value| Fetched {
                value,
                source: FetchSource::Joined,
            });
        }

        let mut state = self.lock();
        if state
            .in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            state.in_flight.remove(key);
        }

        let value = result?;
        if state.generation == generation {
            state.entries.put(
                key.clone(),
                CacheEntry {
                    value: Arc::clone(&value),
                    fetched_at: Instant::now(),
                },
            );
        } else {
            debug!(key = %key, "cache invalidated during fetch; result not stored");
        }

        Ok(Fetched {
            value,
            source: FetchSource::Network,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(s: &str) -> QueryKey {
        QueryKey::for_path(s)
    }

    #[tokio::test]
    async fn fresh_entries_skip_fetch() {
        let cache = QueryCache::new(Duration::from_secs(60), 8);
        let calls = AtomicUsize::new(0);

        for expected in [FetchSource::Network, FetchSource::Cache] {
            let fetched = cache
                .get_or_fetch(&key("a"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ClientError>(7)
                })
                .await
                .unwrap();
            assert_eq!(*fetched.value, 7);
            assert_eq!(fetched.source, expected);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_refetch_but_stay_readable() {
        let cache = QueryCache::new(Duration::ZERO, 8);
        cache
            .get_or_fetch(&key("a"), || async { Ok::<_, ClientError>(1u32) })
            .await
            .unwrap();
        assert!(matches!(cache.lookup(&key("a")), Lookup::Expired(_)));

        let err = cache
            .get_or_fetch(&key("a"), || async {
                Err::<u32, _>(ClientError::Transport {
                    message: "offline".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert_eq!(cache.last_known(&key("a")).as_deref(), Some(&1));
    }

    #[tokio::test]
    async fn concurrent_identical_requests_share_one_fetch() {
        let cache = Arc::new(QueryCache::new(Duration::from_secs(60), 8));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(&key("shared"), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, ClientError>(42u32)
                    })
                    .await
                    .map(|f| *f.value)
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_during_fetch_prevents_store() {
        let cache = Arc::new(QueryCache::new(Duration::from_secs(60), 8));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let task = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_fetch(&key("a"), || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, ClientError>("before mutation")
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        cache.invalidate_all();
        release_tx.send(()).unwrap();

        let fetched = task.await.unwrap().unwrap();
        assert_eq!(*fetched.value, "before mutation");
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = QueryCache::new(Duration::from_secs(60), 8);
        let _ = cache
            .get_or_fetch(&key("a"), || async {
                Err::<u32, _>(ClientError::from_status(500, "boom"))
            })
            .await;
        assert!(matches!(cache.lookup(&key("a")), Lookup::Missing));

        let fetched = cache
            .get_or_fetch(&key("a"), || async { Ok::<_, ClientError>(3) })
            .await
            .unwrap();
        assert_eq!(fetched.source, FetchSource::Network);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recent() {
        let cache = QueryCache::new(Duration::from_secs(60), 2);
        for name in ["a", "b", "c"] {
            cache
                .get_or_fetch(&key(name), || async { Ok::<_, ClientError>(name) })
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert!(matches!(cache.lookup(&key("a")), Lookup::Missing));
        assert!(matches!(cache.lookup(&key("c")), Lookup::Fresh(_)));
    }
}
