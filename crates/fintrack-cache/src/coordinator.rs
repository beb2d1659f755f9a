//! Single-flight registry of in-flight fetches.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Shared handle to an outstanding fetch. Every clone resolves to the same result.
pub type InFlight<V> = Shared<BoxFuture<'static, Result<V>>>;

struct Registration<V> {
    id: u64,
    future: InFlight<V>,
}

type Registry<V> = Arc<Mutex<HashMap<String, Registration<V>>>>;

/// Ensures at most one fetch per cache key is outstanding at any instant.
///
/// Each registered fetch runs on its own Tokio task, so it settles (and
/// unregisters) even if every caller stops waiting for it.
pub struct RefetchCoordinator<V> {
    registry: Registry<V>,
    next_id: Arc<AtomicU64>,
}

impl<V> RefetchCoordinator<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle to the fetch currently registered for `key`, if any.
    pub fn get(&self, key: &str) -> Option<InFlight<V>> {
        self.registry.lock().get(key).map(|r| r.future.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.registry.lock().contains_key(key)
    }

    /// Number of outstanding fetches.
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    /// Join the fetch registered for `key`, or start one with `start`.
    ///
    /// Returns the shared handle and whether this call started the fetch.
    /// The key is registered before `start` runs, so `start` is invoked at
    /// most once per outstanding fetch no matter how many tasks race here.
    /// Must be called from within a Tokio runtime.
    pub fn join_or_start<S>(&self, key: &str, start: S) -> (InFlight<V>, bool)
    where
        S: FnOnce() -> BoxFuture<'static, Result<V>>,
    {
        let (spawned_tx, spawned_rx) = oneshot::channel::<JoinHandle<Result<V>>>();

        let (future, guard) = {
            let mut registry = self.registry.lock();
            if let Some(existing) = registry.get(key) {
                trace!(key = %key, "Joining in-flight fetch");
                return (existing.future.clone(), false);
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let owned_key = key.to_string();
            let future = async move {
                let handle = spawned_rx.await.map_err(|_| Error::Aborted {
                    key: owned_key.clone(),
                    reason: "fetch was never started".to_string(),
                })?;
                match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(Error::Aborted {
                        key: owned_key,
                        reason: e.to_string(),
                    }),
                }
            }
            .boxed()
            .shared();

            registry.insert(
                key.to_string(),
                Registration {
                    id,
                    future: future.clone(),
                },
            );
            debug!(key = %key, in_flight = registry.len(), "Fetch registered");

            let guard = Unregister {
                registry: Arc::clone(&self.registry),
                key: key.to_string(),
                id,
            };
            (future, guard)
        };

        // Outside the lock so a fetch function may touch the cache or this
        // registry. A panic here drops `guard` and the sender, which
        // unregisters the key and fails any joined callers.
        let work = start();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            work.await
        });
        // The receiver lives in `future`, which is still held here.
        let _ = spawned_tx.send(handle);

        (future, true)
    }
}

impl<V> Default for RefetchCoordinator<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for RefetchCoordinator<V> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

/// Removes a registration when its task finishes, panics, or is aborted.
struct Unregister<V> {
    registry: Registry<V>,
    key: String,
    id: u64,
}

impl<V> Drop for Unregister<V> {
    fn drop(&mut self) {
        let mut registry = self.registry.lock();
        if registry.get(&self.key).is_some_and(|r| r.id == self.id) {
            registry.remove(&self.key);
            trace!(key = %self.key, "Fetch unregistered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_second_caller_joins() {
        let coordinator: RefetchCoordinator<u32> = RefetchCoordinator::new();
        let starts = Arc::new(AtomicUsize::new(0));

        let s = Arc::clone(&starts);
        let (first, started) = coordinator.join_or_start("k", move || {
            s.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }.boxed()
        });
        assert!(started);

        let s = Arc::clone(&starts);
        let (second, started) = coordinator.join_or_start("k", move || {
            s.fetch_add(1, Ordering::SeqCst);
            async { Ok(8) }.boxed()
        });
        assert!(!started);

        assert_eq!(first.await.unwrap(), 7);
        assert_eq!(second.await.unwrap(), 7);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unregisters_on_settle() {
        let coordinator: RefetchCoordinator<u32> = RefetchCoordinator::new();

        let (ok, _) = coordinator.join_or_start("ok", || async { Ok(1) }.boxed());
        let (failed, _) = coordinator.join_or_start("failed", || {
            async {
                Err(Error::Aborted {
                    key: "failed".to_string(),
                    reason: "test".to_string(),
                })
            }
            .boxed()
        });
        assert_eq!(coordinator.len(), 2);

        assert!(ok.await.is_ok());
        assert!(failed.await.is_err());
        assert!(coordinator.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_callers_start_once() {
        for _ in 0..50 {
            let coordinator: RefetchCoordinator<u32> = RefetchCoordinator::new();
            let starts = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(tokio::sync::Barrier::new(8));

            let tasks: Vec<_> = (0..8)
                .map(|_| {
                    let coordinator = coordinator.clone();
                    let starts = Arc::clone(&starts);
                    let barrier = Arc::clone(&barrier);
                    tokio::spawn(async move {
                        barrier.wait().await;
                        let (handle, _) = coordinator.join_or_start("k", move || {
                            starts.fetch_add(1, Ordering::SeqCst);
                            async { Ok(7) }.boxed()
                        });
                        handle.await
                    })
                })
                .collect();

            for task in tasks {
                assert_eq!(task.await.unwrap().unwrap(), 7);
            }
            assert_eq!(starts.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_key_is_registered_before_start_runs() {
        let coordinator: RefetchCoordinator<u32> = RefetchCoordinator::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let c = coordinator.clone();
        let s = Arc::clone(&seen);
        let (handle, started) = coordinator.join_or_start("k", move || {
            if c.contains("k") {
                s.fetch_add(1, Ordering::SeqCst);
            }
            async { Ok(1) }.boxed()
        });

        assert!(started);
        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_start_unregisters() {
        let coordinator: RefetchCoordinator<u32> = RefetchCoordinator::new();

        let c = coordinator.clone();
        let joined = tokio::spawn(async move {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                c.join_or_start("k", || -> BoxFuture<'static, Result<u32>> {
                    panic!("start exploded")
                })
            }));
            outcome.is_err()
        });

        assert!(joined.await.unwrap());
        assert!(!coordinator.contains("k"));
    }

    fn explode() -> u32 {
        panic!("fetch exploded")
    }

    #[tokio::test]
    async fn test_panicking_fetch_unregisters() {
        let coordinator: RefetchCoordinator<u32> = RefetchCoordinator::new();

        let (handle, _) = coordinator.join_or_start("boom", || async { Ok(explode()) }.boxed());

        let err = handle.await.unwrap_err();
        assert!(matches!(err, Error::Aborted { .. }));
        assert_eq!(err.key(), "boom");
        assert!(!coordinator.contains("boom"));
    }

    #[tokio::test]
    async fn test_settles_without_waiters() {
        let coordinator: RefetchCoordinator<u32> = RefetchCoordinator::new();
        let (handle, _) = coordinator.join_or_start("k", || async { Ok(1) }.boxed());
        drop(handle);

        for _ in 0..10 {
            if coordinator.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(coordinator.is_empty());
    }
}
