//! Background bookkeeping of provider quota counters.

use metrica_core::ports::UpstreamApi;
use metrica_core::ratelimit::RateLimitSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Default baseline refresh period.
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(15 * 60);
/// Default debounce period for traffic-triggered refreshes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(15);
/// Shortest period accepted for either timer.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Advisory quota snapshot, refreshed periodically and after traffic.
///
/// Counters are written only by [`RateLimitTracker::refresh`]. A failed
/// refresh keeps the previous values.
pub struct RateLimitTracker {
    upstream: Arc<dyn UpstreamApi>,
    snapshot: RwLock<RateLimitSnapshot>,
    dirty: AtomicBool,
    refresh_every: Duration,
    debounce_every: Duration,
}

impl RateLimitTracker {
    pub fn new(upstream: Arc<dyn UpstreamApi>) -> Self {
        Self::with_intervals(upstream, DEFAULT_REFRESH, DEFAULT_DEBOUNCE)
    }

    /// Periods shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn with_intervals(
        upstream: Arc<dyn UpstreamApi>,
        refresh_every: Duration,
        debounce_every: Duration,
    ) -> Self {
        if refresh_every < MIN_INTERVAL || debounce_every < MIN_INTERVAL {
            warn!(
                refresh_ms = refresh_every.as_millis() as u64,
                debounce_ms = debounce_every.as_millis() as u64,
                "Rate limit intervals below one second, clamping"
            );
        }
        Self {
            upstream,
            snapshot: RwLock::new(RateLimitSnapshot::default()),
            dirty: AtomicBool::new(false),
            refresh_every: refresh_every.max(MIN_INTERVAL),
            debounce_every: debounce_every.max(MIN_INTERVAL),
        }
    }

    pub fn intervals(&self) -> (Duration, Duration) {
        (self.refresh_every, self.debounce_every)
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        match self.snapshot.read() {
            Ok(snapshot) => *snapshot,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Request a refresh at the next debounce tick.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    /// Fetch fresh counters. Failures are logged and leave the old values.
    pub async fn refresh(&self) {
        match self.upstream.rate_limit().await {
            Ok(fresh) => {
                match self.snapshot.write() {
                    Ok(mut snapshot) => *snapshot = fresh,
                    Err(poisoned) => *poisoned.into_inner() = fresh,
                }
                debug!(
                    rest = fresh.core.remaining,
                    graphql = fresh.graphql.remaining,
                    search = fresh.search.remaining,
                    "Updated remaining requests"
                );
            }
            Err(e) => {
                warn!(error = %e, "Failed to update remaining requests");
            }
        }
    }

    /// Refresh only if traffic happened since the previous tick.
    pub async fn refresh_if_dirty(&self) -> bool {
        if self.dirty.swap(false, Ordering::Relaxed) {
            self.refresh().await;
            true
        } else {
            false
        }
    }

    /// Run both timers until `shutdown` turns true.
    ///
    /// The first baseline tick fires immediately, so counters are loaded at
    /// startup.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut baseline = interval(self.refresh_every);
        let mut debounce = interval(self.debounce_every);
        baseline.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debounce.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Consume the immediate debounce tick.
        debounce.tick().await;

        info!(
            refresh_secs = self.refresh_every.as_secs(),
            debounce_secs = self.debounce_every.as_secs(),
            "Starting rate limit tracker"
        );

        loop {
            tokio::select! {
                _ = baseline.tick() => {
                    self.refresh().await;
                }
                _ = debounce.tick() => {
                    self.refresh_if_dirty().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Rate limit tracker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move { tracker.run(shutdown).await })
    }
}
