//! Response cache with stale-while-revalidate fetching.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use fintrack_types::SharedClock;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::CacheConfig;
use crate::coordinator::{InFlight, RefetchCoordinator};
use crate::error::{Error, Result};
use crate::key::cache_key;
use crate::ttl::TtlPolicy;

/// Entry stored in the cache. Replaced wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// Cached response.
    pub data: V,

    /// When the entry was written (unix millis).
    pub timestamp: i64,

    /// Cache key the entry is stored under.
    pub key: String,
}

/// How a [`CacheStore::fetch_with_outcome`] call was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Valid entry returned, no refetch needed.
    Hit,
    /// Valid entry returned while a background refetch runs.
    HitRevalidating,
    /// Fresh data from the network (own fetch or a joined one).
    Refreshed,
    /// The fetch failed and an expired entry was returned instead.
    StaleServed,
}

/// How a background refetch ended. Logged, never surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidateOutcome {
    Refreshed,
    Failed,
}

/// Data plus the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<V> {
    pub data: V,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    revalidations: u64,
    network_fetches: u64,
    stale_served: u64,
    background_failures: u64,
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    counters: Counters,
}

/// Keyed table of time-stamped responses.
///
/// Cheap to clone; clones share the table and the in-flight registry.
pub struct CacheStore<V> {
    inner: Arc<Mutex<CacheInner<V>>>,
    coordinator: RefetchCoordinator<V>,
    clock: SharedClock,
    policy: TtlPolicy,
    config: CacheConfig,
}

impl<V> CacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache reading time from `clock`.
    pub fn new(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                counters: Counters::default(),
            })),
            coordinator: RefetchCoordinator::new(),
            clock,
            policy: TtlPolicy::new(&config),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Data for `key` if present and within TTL.
    ///
    /// An expired entry is evicted. Never touches the network.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();

        match inner.entries.get(key) {
            Some(entry) if self.policy.is_valid(entry.timestamp, now) => {
                trace!(key = %key, "Cache hit");
                Some(entry.data.clone())
            }
            Some(_) => {
                debug!(key = %key, "Cache entry expired, evicting");
                inner.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or replace the entry for `key`, stamped with the current time.
    pub fn set(&self, key: &str, data: V) {
        let timestamp = self.clock.now_millis();
        self.inner.lock().entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                timestamp,
                key: key.to_string(),
            },
        );
    }

    /// Raw entry for `key`, expired or not. Does not evict.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Remove every entry whose key contains `pattern`, or everything when
    /// `pattern` is `None`. Returns the number of entries removed.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();

        match pattern {
            None => inner.entries.clear(),
            Some(pattern) => inner.entries.retain(|key, _| !key.contains(pattern)),
        }

        let removed = before - inner.entries.len();
        debug!(pattern = ?pattern, removed, "Cache invalidated");
        removed
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Handle to the outstanding fetch for `key`, if one is running.
    pub fn in_flight(&self, key: &str) -> Option<InFlight<V>> {
        self.coordinator.get(key)
    }

    /// Fetch through the cache, returning only the data.
    ///
    /// See [`fetch_with_outcome`](Self::fetch_with_outcome).
    pub async fn fetch<F, Fut, E>(
        &self,
        endpoint: &str,
        fetch_fn: F,
        params: Option<&Value>,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        self.fetch_with_outcome(endpoint, fetch_fn, params)
            .await
            .map(|fetched| fetched.data)
    }

    /// Fetch through the cache under the stale-while-revalidate policy.
    ///
    /// 1. A valid entry is returned immediately. If it has less than the
    ///    refresh threshold left and no fetch is registered for the key, a
    ///    background refetch is started; its failure is logged and dropped.
    /// 2. Otherwise the call joins the fetch registered for the key, or
    ///    registers its own, so only one network call per key is ever
    ///    outstanding.
    /// 3. If that fetch fails and an expired entry is still stored, the stale
    ///    data is returned with a warning. With no entry at all the error is
    ///    propagated.
    pub async fn fetch_with_outcome<F, Fut, E>(
        &self,
        endpoint: &str,
        fetch_fn: F,
        params: Option<&Value>,
    ) -> Result<Fetched<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        let key = cache_key(endpoint, params);
        let now = self.clock.now_millis();

        let valid = {
            let inner = self.inner.lock();
            inner
                .entries
                .get(&key)
                .filter(|entry| self.policy.is_valid(entry.timestamp, now))
                .cloned()
        };

        if let Some(entry) = valid {
            let mut outcome = FetchOutcome::Hit;

            if self.policy.wants_revalidation(entry.timestamp, now) {
                let (_, started) = self.join_or_start(&key, fetch_fn, true);
                if started {
                    debug!(
                        key = %key,
                        remaining_ms = self.policy.remaining(entry.timestamp, now),
                        "Entry near expiry, revalidating in background"
                    );
                    self.inner.lock().counters.revalidations += 1;
                }
                outcome = FetchOutcome::HitRevalidating;
            }

            self.inner.lock().counters.hits += 1;
            return Ok(Fetched {
                data: entry.data,
                outcome,
            });
        }

        let (in_flight, _) = self.join_or_start(&key, fetch_fn, false);

        match in_flight.await {
            Ok(data) => Ok(Fetched {
                data,
                outcome: FetchOutcome::Refreshed,
            }),
            Err(err) => {
                let mut inner = self.inner.lock();
                match inner.entries.get(&key).map(|entry| entry.data.clone()) {
                    Some(data) => {
                        inner.counters.stale_served += 1;
                        warn!(key = %key, error = %err, "Fetch failed, returning stale cache");
                        Ok(Fetched {
                            data,
                            outcome: FetchOutcome::StaleServed,
                        })
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            in_flight: self.coordinator.len(),
            hits: inner.counters.hits,
            revalidations: inner.counters.revalidations,
            network_fetches: inner.counters.network_fetches,
            stale_served: inner.counters.stale_served,
            background_failures: inner.counters.background_failures,
        }
    }

    fn join_or_start<F, Fut, E>(
        &self,
        key: &str,
        fetch_fn: F,
        background: bool,
    ) -> (InFlight<V>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let clock = Arc::clone(&self.clock);
        let owned_key = key.to_string();

        self.coordinator.join_or_start(key, move || {
            let request = fetch_fn();
            async move {
                match request.await {
                    Ok(data) => {
                        let timestamp = clock.now_millis();
                        let mut inner = inner.lock();
                        inner.entries.insert(
                            owned_key.clone(),
                            CacheEntry {
                                data: data.clone(),
                                timestamp,
                                key: owned_key.clone(),
                            },
                        );
                        inner.counters.network_fetches += 1;
                        if background {
                            debug!(
                                key = %owned_key,
                                outcome = ?RevalidateOutcome::Refreshed,
                                "Background refetch stored"
                            );
                        }
                        Ok(data)
                    }
                    Err(e) => {
                        let source: Arc<dyn StdError + Send + Sync> = Arc::from(e.into());
                        if background {
                            inner.lock().counters.background_failures += 1;
                            warn!(
                                key = %owned_key,
                                outcome = ?RevalidateOutcome::Failed,
                                error = %source,
                                "Background refetch failed"
                            );
                        }
                        Err(Error::Fetch {
                            key: owned_key,
                            source,
                        })
                    }
                }
            }
            .boxed()
        })
    }
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            coordinator: self.coordinator.clone(),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
            config: self.config.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Stored entries, expired ones included.
    pub entries: usize,

    /// Fetches currently registered with the coordinator.
    pub in_flight: usize,

    /// Fetches answered from a valid entry.
    pub hits: u64,

    /// Background refetches started.
    pub revalidations: u64,

    /// Successful network fetches written to the table.
    pub network_fetches: u64,

    /// Failed fetches answered with an expired entry.
    pub stale_served: u64,

    /// Background refetches that failed.
    pub background_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintrack_types::ManualClock;
    use serde_json::json;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn store(clock: &Arc<ManualClock>) -> CacheStore<Value> {
        CacheStore::new(CacheConfig::default(), clock.clone())
    }

    /// Fetch function that counts calls and resolves with `value`.
    fn counting(
        calls: &Arc<AtomicUsize>,
        value: Value,
    ) -> impl FnOnce() -> futures::future::Ready<std::result::Result<Value, io::Error>> + use<> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(value))
        }
    }

    fn failing(
        calls: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> futures::future::Ready<std::result::Result<Value, io::Error>> + use<> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Err(io::Error::other("network down")))
        }
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        cache.set("accounts", json!([1, 2]));

        clock.set(59_999);
        assert_eq!(cache.get("accounts"), Some(json!([1, 2])));

        clock.set(60_001);
        assert_eq!(cache.get("accounts"), None);
        assert!(cache.entry("accounts").is_none(), "expired entry is evicted");
    }

    #[tokio::test]
    async fn test_set_twice_keeps_latest_timestamp() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = store(&clock);

        cache.set("k", json!({"bal": 1}));
        clock.set(5_000);
        cache.set("k", json!({"bal": 1}));

        assert_eq!(cache.get("k"), Some(json!({"bal": 1})));
        let entry = cache.entry("k").unwrap();
        assert_eq!(entry.timestamp, 5_000);
        assert_eq!(entry.key, "k");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_by_pattern() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        cache.set("subscriptions|account_id:1", json!([]));
        cache.set("subscriptions|account_id:2", json!([]));
        cache.set("accounts", json!([]));

        assert_eq!(cache.invalidate(Some("account_id:1")), 1);
        assert!(cache.get("subscriptions|account_id:1").is_none());
        assert!(cache.get("subscriptions|account_id:2").is_some());

        assert_eq!(cache.invalidate(None), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_miss_caches_result() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let fetched = cache
            .fetch_with_outcome("accounts", counting(&calls, json!([1])), None)
            .await
            .unwrap();
        assert_eq!(fetched.outcome, FetchOutcome::Refreshed);
        assert_eq!(cache.get("accounts"), Some(json!([1])));

        let again = cache
            .fetch_with_outcome("accounts", counting(&calls, json!([2])), None)
            .await
            .unwrap();
        assert_eq!(again.outcome, FetchOutcome::Hit);
        assert_eq!(again.data, json!([1]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_call() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        let calls = Arc::new(AtomicUsize::new(0));
        let params = json!({"id": 1});

        let (a, b) = tokio::join!(
            cache.fetch("accounts", counting(&calls, json!({"bal": 100})), Some(&params)),
            cache.fetch("accounts", counting(&calls, json!({"bal": 999})), Some(&params)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), json!({"bal": 100}));
        assert_eq!(b.unwrap(), json!({"bal": 100}));
        assert!(cache.in_flight("accounts|id:1").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetches_across_workers_share_one_call() {
        for _ in 0..50 {
            let clock = Arc::new(ManualClock::new(0));
            let cache = store(&clock);
            let calls = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(tokio::sync::Barrier::new(8));

            let tasks: Vec<_> = (0..8)
                .map(|i| {
                    let cache = cache.clone();
                    let fetch_fn = counting(&calls, json!({ "caller": i }));
                    let barrier = Arc::clone(&barrier);
                    tokio::spawn(async move {
                        barrier.wait().await;
                        cache.fetch("accounts", fetch_fn, None).await
                    })
                })
                .collect();

            let mut results = Vec::new();
            for task in tasks {
                results.push(task.await.unwrap().unwrap());
            }

            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(results.iter().all(|r| *r == results[0]));
        }
    }

    #[tokio::test]
    async fn test_concurrent_failure_is_shared() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.fetch("accounts", failing(&calls), None),
            cache.fetch("accounts", failing(&calls), None),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let (a, b) = (a.unwrap_err(), b.unwrap_err());
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(cache.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn test_stale_fallback_on_failure() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set("accounts", json!({"bal": 100}));

        clock.set(70_000);
        let fetched = cache
            .fetch_with_outcome("accounts", failing(&calls), None)
            .await
            .unwrap();

        assert_eq!(fetched.outcome, FetchOutcome::StaleServed);
        assert_eq!(fetched.data, json!({"bal": 100}));
        assert_eq!(cache.stats().stale_served, 1);
    }

    #[tokio::test]
    async fn test_failure_without_entry_propagates() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = cache
            .fetch("accounts", failing(&calls), None)
            .await
            .unwrap_err();

        assert_eq!(err.key(), "accounts");
        let source = err.fetch_source().unwrap();
        assert_eq!(source.to_string(), "network down");
        assert!(source.downcast_ref::<io::Error>().is_some());
    }

    #[tokio::test]
    async fn test_background_refetch_near_expiry() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        let calls = Arc::new(AtomicUsize::new(0));
        let params = json!({"id": 1});

        cache.set("accounts|id:1", json!({"bal": 100}));

        clock.set(50_000);
        assert_eq!(cache.get("accounts|id:1"), Some(json!({"bal": 100})));

        clock.set(51_500);
        let fetched = cache
            .fetch_with_outcome(
                "accounts",
                counting(&calls, json!({"bal": 150})),
                Some(&params),
            )
            .await
            .unwrap();
        assert_eq!(fetched.outcome, FetchOutcome::HitRevalidating);
        assert_eq!(fetched.data, json!({"bal": 100}));

        // A second hit inside the window does not start another refetch.
        let again = cache
            .fetch("accounts", counting(&calls, json!({"bal": 999})), Some(&params))
            .await
            .unwrap();
        assert_eq!(again, json!({"bal": 100}));

        cache.in_flight("accounts|id:1").unwrap().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.set(52_000);
        assert_eq!(cache.get("accounts|id:1"), Some(json!({"bal": 150})));
        assert_eq!(cache.stats().revalidations, 1);
    }

    #[tokio::test]
    async fn test_background_failure_keeps_entry() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set("accounts", json!({"bal": 100}));

        clock.set(55_000);
        let data = cache.fetch("accounts", failing(&calls), None).await.unwrap();
        assert_eq!(data, json!({"bal": 100}));

        assert!(cache.in_flight("accounts").unwrap().await.is_err());

        let stats = cache.stats();
        assert_eq!(stats.background_failures, 1);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(cache.get("accounts"), Some(json!({"bal": 100})));
    }

    #[tokio::test]
    async fn test_expired_caller_joins_background_refetch() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set("accounts", json!({"bal": 100}));

        let (release, gate) = oneshot::channel::<()>();
        let gated_calls = Arc::clone(&calls);
        let gated = move || {
            gated_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                gate.await.map_err(io::Error::other)?;
                Ok::<_, io::Error>(json!({"bal": 150}))
            }
        };

        clock.set(55_000);
        cache.fetch("accounts", gated, None).await.unwrap();
        assert!(cache.in_flight("accounts").is_some());

        clock.set(61_000);
        let (joined, _) = tokio::join!(
            cache.fetch_with_outcome("accounts", counting(&calls, json!({"bal": 999})), None),
            async move {
                tokio::task::yield_now().await;
                release.send(()).unwrap();
            },
        );

        let joined = joined.unwrap();
        assert_eq!(joined.outcome, FetchOutcome::Refreshed);
        assert_eq!(joined.data, json!({"bal": 150}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store(&clock);
        let other = cache.clone();

        cache.set("k", json!(1));
        assert_eq!(other.get("k"), Some(json!(1)));
    }
}
