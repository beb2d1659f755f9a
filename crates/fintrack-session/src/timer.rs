//! One-shot scheduling for the refresh timer.
//!
//! The session store never sleeps itself; it hands a task and a delay to a
//! [`Scheduler`] and keeps the returned [`TimerHandle`] so the timer can be
//! cancelled or superseded. [`ManualScheduler`] makes the pending timers
//! inspectable and fires them against a [`ManualClock`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fintrack_types::{Clock, ManualClock, duration_millis};
use futures::future::BoxFuture;
use parking_lot::Mutex;

/// Work run when a timer fires.
pub type TimerTask = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Schedules single-shot delayed tasks.
pub trait Scheduler: Send + Sync + std::fmt::Debug {
    /// Run `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Shared scheduler for use across async contexts.
pub type SharedScheduler = Arc<dyn Scheduler>;

/// Cancellation handle for a scheduled task.
///
/// Dropping the handle leaves the timer running; only [`cancel`](Self::cancel)
/// stops it.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop the timer if it has not fired yet.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

// ============================================================================
// TokioScheduler
// ============================================================================

/// Scheduler backed by `tokio::time::sleep` on a spawned task.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task().await;
        });
        let abort = handle.abort_handle();
        TimerHandle::new(move || abort.abort())
    }
}

// ============================================================================
// ManualScheduler (for testing)
// ============================================================================

struct ManualTimer {
    id: u64,
    due_at: i64,
    task: TimerTask,
}

/// Scheduler driven by hand against a [`ManualClock`].
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    timers: Arc<Mutex<Vec<ManualTimer>>>,
    next_id: AtomicU64,
}

impl ManualScheduler {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            timers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Delays until each pending timer fires, soonest first.
    pub fn pending(&self) -> Vec<Duration> {
        let now = self.clock.now_millis();
        let mut delays: Vec<Duration> = self
            .timers
            .lock()
            .iter()
            .map(|t| Duration::from_millis(u64::try_from(t.due_at - now).unwrap_or(0)))
            .collect();
        delays.sort();
        delays
    }

    /// Number of timers that have not fired or been cancelled.
    pub fn pending_count(&self) -> usize {
        self.timers.lock().len()
    }

    /// Move the clock forward by `by` and run every timer that came due, in
    /// due order. Returns how many fired.
    pub async fn advance(&self, by: Duration) -> usize {
        self.clock.advance(by);
        let now = self.clock.now_millis();
        let mut fired = 0;

        loop {
            let next = {
                let mut timers = self.timers.lock();
                let due = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due_at <= now)
                    .min_by_key(|(_, t)| (t.due_at, t.id))
                    .map(|(i, _)| i);
                due.map(|i| timers.remove(i))
            };

            match next {
                Some(timer) => {
                    (timer.task)().await;
                    fired += 1;
                }
                None => break,
            }
        }

        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let due_at = self
            .clock
            .now_millis()
            .saturating_add(duration_millis(delay));

        self.timers.lock().push(ManualTimer { id, due_at, task });

        let timers = Arc::clone(&self.timers);
        TimerHandle::new(move || timers.lock().retain(|t| t.id != id))
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.clock.now_millis())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>) -> TimerTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_manual_fires_on_exact_tick() {
        let clock = Arc::new(ManualClock::new(0));
        let scheduler = ManualScheduler::new(clock.clone());
        let fired = Arc::new(AtomicUsize::new(0));

        let _handle = scheduler.schedule_once(Duration::from_millis(1_000), counter_task(&fired));
        assert_eq!(scheduler.pending(), vec![Duration::from_millis(1_000)]);

        assert_eq!(scheduler.advance(Duration::from_millis(999)).await, 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.advance(Duration::from_millis(1)).await, 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_manual_cancel() {
        let clock = Arc::new(ManualClock::new(0));
        let scheduler = ManualScheduler::new(clock);
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.schedule_once(Duration::from_millis(10), counter_task(&fired));
        handle.cancel();

        assert_eq!(scheduler.advance(Duration::from_secs(1)).await, 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let _handle = TokioScheduler.schedule_once(Duration::from_secs(5), counter_task(&fired));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_cancel() {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler.schedule_once(Duration::from_secs(5), counter_task(&fired));
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
