//! Correlation of in-flight requests with their responses.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use querybridge_core::TransportError;

use super::ResponseData;

type Outcome = Result<ResponseData, TransportError>;

/// Hands out request ids and routes each response to the caller waiting on
/// it. Responses may arrive in any order; each id resolves at most once.
///
/// With a capacity set, registering beyond it fails the oldest pending
/// request with [`TransportError::Evicted`].
#[derive(Debug)]
pub struct RequestTracker {
    next_id: AtomicU64,
    pending: Mutex<BTreeMap<u64, oneshot::Sender<Outcome>>>,
    capacity: Option<usize>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    /// Creates a tracker without a pending-request cap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(BTreeMap::new()),
            capacity: None,
        }
    }

    /// Creates a tracker holding at most `capacity` pending requests.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(BTreeMap::new()),
            capacity: Some(capacity),
        }
    }

    fn pending(&self) -> MutexGuard<'_, BTreeMap<u64, oneshot::Sender<Outcome>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a fresh id and the receiver its response will arrive on.
    pub fn register(&self) -> (u64, oneshot::Receiver<Outcome>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        let mut pending = self.pending();
        if let Some(capacity) = self.capacity {
            while pending.len() >= capacity.max(1) {
                let Some((evicted, sender)) = pending.pop_first() else {
                    break;
                };
                warn!(id = evicted, "Evicting oldest pending request");
                let _ = sender.send(Err(TransportError::Evicted { id: evicted }));
            }
        }
        pending.insert(id, sender);
        (id, receiver)
    }

    /// Delivers `outcome` to the caller waiting on `id`.
    ///
    /// Returns `false` when `id` is unknown, already resolved, or its caller
    /// stopped waiting.
    pub fn resolve(&self, id: u64, outcome: Outcome) -> bool {
        let Some(sender) = self.pending().remove(&id) else {
            debug!(id, "Dropping response for unknown request");
            return false;
        };
        sender.send(outcome).is_ok()
    }

    /// Forgets `id` without notifying its caller.
    pub fn forget(&self, id: u64) {
        self.pending().remove(&id);
    }

    /// Fails every pending request with `error`.
    pub fn fail_all(&self, error: &TransportError) {
        let drained = std::mem::take(&mut *self.pending());
        if !drained.is_empty() {
            debug!(count = drained.len(), error = %error, "Failing pending requests");
        }
        for sender in drained.into_values() {
            let _ = sender.send(Err(error.clone()));
        }
    }

    /// Number of requests still waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }
}
