//! Per-thread concurrency control.
//!
//! Ensures only one turn runs per thread at a time. A second message on the
//! same thread waits until the first turn has appended its reply, so it
//! always sees complete history. Turns on different threads never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Manages per-thread run locks.
///
/// Each thread id maps to a `Semaphore(1)`. Acquiring the permit ensures
/// exclusive access for one turn at a time; it auto-releases on drop.
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for SessionLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the run lock for a thread, waiting for any turn in flight.
    pub async fn acquire(&self, thread_id: &str) -> Result<OwnedSemaphorePermit, AcquireError> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(thread_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned().await
    }

    /// Number of tracked threads.
    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop semaphores nobody holds or waits on.
    ///
    /// The map itself owns one reference; anything above that is a turn in
    /// flight or a waiter about to acquire.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| Arc::strong_count(sem) > 1);
    }
}
