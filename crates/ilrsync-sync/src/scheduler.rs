//! Sync scheduler - turns timer ticks and manual requests into sync triggers
//!
//! The [`SyncScheduler`] owns the periodic timer that drives sync cycles.
//! A [`SyncTrigger`] handle lets other tasks (a signal handler, for
//! instance) request an immediate cycle without waiting for the next tick.
//!
//! ## Flow
//!
//! ```text
//! interval tick ──────────┐
//!                         ├──→ SyncScheduler::next() ──→ Synchronizer::run_cycle()
//! SyncTrigger::request ───┘
//! ```
//!
//! Cycles never overlap within one process because the caller awaits each
//! cycle before asking for the next trigger. Ticks missed while a cycle
//! runs are delayed, not replayed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Why a sync cycle should start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The poll interval elapsed
    Timer,
    /// Someone called [`SyncTrigger::request_sync`]
    Requested,
}

/// Cloneable handle for requesting an immediate sync
#[derive(Debug, Clone)]
pub struct SyncTrigger {
    sync_requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl SyncTrigger {
    /// Requests a sync as soon as the current cycle (if any) finishes
    pub fn request_sync(&self) {
        info!("Manual sync requested");
        self.sync_requested.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_sync_requested(&self) -> bool {
        self.sync_requested.load(Ordering::Acquire)
    }
}

/// Periodic sync timer with manual override
pub struct SyncScheduler {
    poll_interval: Duration,
    ticker: Option<Interval>,
    sync_requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl SyncScheduler {
    /// Creates a new `SyncScheduler`
    ///
    /// # Arguments
    /// * `poll_interval` - Time between scheduled cycles
    ///
    /// # Returns
    /// The scheduler and a [`SyncTrigger`] that requests immediate cycles.
    pub fn new(poll_interval: Duration) -> (Self, SyncTrigger) {
        let sync_requested = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());

        info!(
            poll_secs = poll_interval.as_secs(),
            "Creating sync scheduler"
        );

        let trigger = SyncTrigger {
            sync_requested: sync_requested.clone(),
            notify: notify.clone(),
        };
        let scheduler = Self {
            poll_interval,
            ticker: None,
            sync_requested,
            notify,
        };
        (scheduler, trigger)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns whether a sync has been requested and not yet consumed
    pub fn is_sync_requested(&self) -> bool {
        self.sync_requested.load(Ordering::Acquire)
    }

    /// Clears a pending sync request
    pub fn clear_sync_request(&self) {
        self.sync_requested.store(false, Ordering::Release);
    }

    /// Waits for the next reason to run a cycle
    ///
    /// The first call returns [`TriggerReason::Timer`] immediately so a
    /// cycle runs at startup. A pending manual request takes priority over
    /// the timer.
    ///
    /// # Returns
    /// `None` once `shutdown` is cancelled.
    pub async fn next(&mut self, shutdown: &CancellationToken) -> Option<TriggerReason> {
        let poll_interval = self.poll_interval;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            if self.sync_requested.swap(false, Ordering::AcqRel) {
                debug!("sync request consumed");
                return Some(TriggerReason::Requested);
            }

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Sync scheduler stopped");
                    return None;
                }
                // Wakes the loop; the flag check above decides
                _ = self.notify.notified() => {}
                _ = ticker.tick() => return Some(TriggerReason::Timer),
            }
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_scheduler_with_clear_flag() {
        let (scheduler, trigger) = SyncScheduler::new(Duration::from_secs(300));

        assert!(!scheduler.is_sync_requested());
        assert!(!trigger.is_sync_requested());
        assert_eq!(scheduler.poll_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_request_sync_sets_flag() {
        let (scheduler, trigger) = SyncScheduler::new(Duration::from_secs(300));

        trigger.request_sync();
        assert!(scheduler.is_sync_requested());

        scheduler.clear_sync_request();
        assert!(!trigger.is_sync_requested());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate_then_periodic() {
        let (mut scheduler, _trigger) = SyncScheduler::new(Duration::from_secs(300));
        let shutdown = CancellationToken::new();

        let start = tokio::time::Instant::now();
        assert_eq!(scheduler.next(&shutdown).await, Some(TriggerReason::Timer));
        assert!(start.elapsed() < Duration::from_secs(1));

        assert_eq!(scheduler.next(&shutdown).await, Some(TriggerReason::Timer));
        assert!(start.elapsed() >= Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_preempts_timer() {
        let (mut scheduler, trigger) = SyncScheduler::new(Duration::from_secs(300));
        let shutdown = CancellationToken::new();
        scheduler.next(&shutdown).await;

        let requester = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.request_sync();
        });

        let start = tokio::time::Instant::now();
        assert_eq!(scheduler.next(&shutdown).await, Some(TriggerReason::Requested));
        assert!(start.elapsed() < Duration::from_secs(300));
        assert!(!scheduler.is_sync_requested());
        requester.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumed_request_does_not_fire_twice() {
        let (mut scheduler, trigger) = SyncScheduler::new(Duration::from_secs(300));
        let shutdown = CancellationToken::new();
        scheduler.next(&shutdown).await;

        trigger.request_sync();
        assert_eq!(scheduler.next(&shutdown).await, Some(TriggerReason::Requested));

        // The leftover notification must not produce a second request
        assert_eq!(scheduler.next(&shutdown).await, Some(TriggerReason::Timer));
    }

    #[tokio::test]
    async fn test_next_returns_none_on_shutdown() {
        let (mut scheduler, _trigger) = SyncScheduler::new(Duration::from_secs(300));
        let shutdown = CancellationToken::new();
        scheduler.next(&shutdown).await;

        shutdown.cancel();
        let next = tokio::time::timeout(Duration::from_secs(2), scheduler.next(&shutdown))
            .await
            .expect("scheduler should stop when cancelled");
        assert_eq!(next, None);
    }
}
