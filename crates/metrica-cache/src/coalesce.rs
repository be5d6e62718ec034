//! Per-key single-flight gate.
//!
//! At most one pending job exists per key. Callers arriving while a job is
//! pending wait for its completion signal, never for its result, and then go
//! through admission again. Whatever the winner produced is expected to be
//! found in the response cache; when it is not, the waiter computes its own.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrica_core::RequestKey;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// An in-flight computation for one key.
struct PendingJob {
    id: u64,
    /// Dropped when the job settles, which wakes every subscribed waiter.
    done: watch::Sender<()>,
}

type Registry = DashMap<RequestKey, PendingJob>;

/// Registry of pending jobs, keyed by request.
#[derive(Clone, Default)]
pub struct RequestCoalescer {
    pending: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

/// Outcome of admission.
#[must_use = "dropping the admission releases the key immediately"]
pub struct Admission {
    /// Whether another job for the same key had to settle first.
    pub already_pending: bool,
    guard: PendingGuard,
}

impl Admission {
    pub fn guard(&self) -> &PendingGuard {
        &self.guard
    }

    /// Release the key now instead of at drop.
    pub fn release(self) {
        self.guard.release();
    }
}

/// Removes the pending job when dropped, on every exit path.
pub struct PendingGuard {
    pending: Arc<Registry>,
    key: RequestKey,
    id: u64,
}

impl PendingGuard {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let id = self.id;
        if self
            .pending
            .remove_if(&self.key, |_, job| job.id == id)
            .is_some()
        {
            debug!(key = %self.key, "Released pending request");
        }
    }
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no job is pending for `key`, then register one.
    pub async fn admit(&self, key: &RequestKey) -> Admission {
        let mut already_pending = false;

        loop {
            let mut done = match self.pending.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let (done, _) = watch::channel(());
                    slot.insert(PendingJob { id, done });
                    return Admission {
                        already_pending,
                        guard: PendingGuard {
                            pending: Arc::clone(&self.pending),
                            key: key.clone(),
                            id,
                        },
                    };
                }
                Entry::Occupied(job) => job.get().done.subscribe(),
            };

            debug!(key = %key, "Awaiting pending request");
            already_pending = true;
            // Resolves with an error once the sender is dropped by the guard.
            let _ = done.changed().await;
        }
    }

    pub fn is_pending(&self, key: &RequestKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of keys with a pending job.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
