//! Versioned change notification for long-polling observers.
//!
//! A [`Notifier`] tracks a monotonically increasing version for one shared
//! resource and parks observers until the version advances. Observers that
//! already missed an update resolve immediately; the rest are released in a
//! single batch by the next [`Notifier::bump`], all receiving the same
//! payload stamped with the new version. Destroying the hub releases every
//! pending observer with a distinguishable outcome so callers can tell
//! teardown apart from an update or a timeout.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

/// Millisecond-resolution version of a watched resource.
///
/// Versions are wall-clock derived but strictly monotonic: two bumps within
/// the same millisecond still produce distinct, increasing versions.
pub type Version = u64;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> Version {
    chrono::Utc::now().timestamp_millis().max(0) as Version
}

/// A payload annotated with the version it was observed at.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Stamped<T> {
    pub payload: T,
    pub modified: Version,
}

/// Outcome of [`Notifier::wait`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WaitOutcome<T> {
    /// The version advanced past the caller's known version.
    Changed(Stamped<T>),
    /// The hub was destroyed while the caller was parked.
    Destroyed,
}

/// Outcome of [`Notifier::poll`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome<T> {
    /// The version advanced past the caller's known version.
    Changed(Stamped<T>),
    /// The deadline elapsed first; carries the caller's own payload and the
    /// version at expiry.
    TimedOut(Stamped<T>),
    /// The hub was destroyed while the caller was parked.
    Destroyed,
}

struct NotifierInner<T> {
    modified: Version,
    destroyed: bool,
    next_waiter: u64,
    waiters: HashMap<u64, oneshot::Sender<Stamped<T>>>,
}

/// Wait/notify hub for a single versioned resource.
///
/// Cloning is cheap and shares the underlying state, so one clone can park
/// observers while another bumps or destroys the hub.
pub struct Notifier<T> {
    inner: Arc<Mutex<NotifierInner<T>>>,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Notifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Notifier<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(NotifierInner {
                modified: now_millis(),
                destroyed: false,
                next_waiter: 0,
                waiters: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NotifierInner<T>> {
        // Recover from poisoning rather than propagating a panic; the inner
        // state stays consistent under every code path that holds the lock.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Latest version. No side effects.
    pub fn modified(&self) -> Version {
        self.lock().modified
    }

    /// Overrides the current version. Does not release waiters.
    pub fn set_modified(&self, modified: Version) {
        self.lock().modified = modified;
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Number of currently parked waiters.
    pub fn waiter_count(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Releases every pending waiter and marks the hub dead. Waiters observe
    /// [`WaitOutcome::Destroyed`] / [`PollOutcome::Destroyed`]. Idempotent.
    pub fn destroy(&self) {
        let waiters: Vec<_> = {
            let mut inner = self.lock();
            inner.destroyed = true;
            inner.waiters.drain().map(|(_, tx)| tx).collect()
        };
        // Dropping the senders resolves the receivers with the destroyed
        // marker; done outside the lock.
        drop(waiters);
    }
}

impl<T: Clone> Notifier<T> {
    /// Advances the version and releases every waiter registered before this
    /// call with `payload` stamped at the new version. Returns the new
    /// version.
    pub fn bump(&self, payload: T) -> Version {
        let (modified, waiters) = {
            let mut inner = self.lock();
            inner.modified = (inner.modified + 1).max(now_millis());
            let waiters: Vec<_> = inner.waiters.drain().map(|(_, tx)| tx).collect();
            (inner.modified, waiters)
        };
        for tx in waiters {
            // A waiter whose poll already timed out has dropped its receiver.
            let _ = tx.send(Stamped {
                payload: payload.clone(),
                modified,
            });
        }
        modified
    }

    /// Waits until the version advances past `known`.
    ///
    /// If `known` is already stale, resolves immediately with the caller's
    /// `payload` at the current version. Otherwise parks until the next
    /// [`bump`](Self::bump), resolving with the bumper's payload, or until
    /// [`destroy`](Self::destroy).
    pub async fn wait(&self, known: Version, payload: T) -> WaitOutcome<T> {
        let rx = {
            let mut inner = self.lock();
            if inner.destroyed {
                return WaitOutcome::Destroyed;
            }
            if known < inner.modified {
                return WaitOutcome::Changed(Stamped {
                    payload,
                    modified: inner.modified,
                });
            }
            let (tx, rx) = oneshot::channel();
            let id = inner.next_waiter;
            inner.next_waiter += 1;
            inner.waiters.insert(id, tx);
            rx
        };
        match rx.await {
            Ok(stamped) => WaitOutcome::Changed(stamped),
            Err(_) => WaitOutcome::Destroyed,
        }
    }

    /// Races [`wait`](Self::wait) against a deadline of length `timeout`.
    ///
    /// Exactly one of the two outcomes fires: a delivered update cancels the
    /// deadline, and an elapsed deadline withdraws the wait registration
    /// before resolving with the caller's payload at the current version.
    pub async fn poll(&self, known: Version, payload: T, timeout: Duration) -> PollOutcome<T> {
        let (id, rx) = {
            let mut inner = self.lock();
            if inner.destroyed {
                return PollOutcome::Destroyed;
            }
            if known < inner.modified {
                return PollOutcome::Changed(Stamped {
                    payload,
                    modified: inner.modified,
                });
            }
            let (tx, rx) = oneshot::channel();
            let id = inner.next_waiter;
            inner.next_waiter += 1;
            inner.waiters.insert(id, tx);
            (id, rx)
        };
        tokio::select! {
            // Prefer a delivered update over a simultaneous timeout.
            biased;
            result = rx => match result {
                Ok(stamped) => PollOutcome::Changed(stamped),
                Err(_) => PollOutcome::Destroyed,
            },
            _ = tokio::time::sleep(timeout) => {
                let mut inner = self.lock();
                inner.waiters.remove(&id);
                PollOutcome::TimedOut(Stamped {
                    payload,
                    modified: inner.modified,
                })
            }
        }
    }
}
