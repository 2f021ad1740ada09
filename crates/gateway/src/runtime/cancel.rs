//! Per-thread cancellation tokens.
//!
//! Each running turn gets a `CancelToken`. Calling `cancel()` on it signals
//! the engine to stop at its next suspension point. Waiters parked on
//! [`CancelToken::cancelled`] wake immediately, so a turn blocked on a slow
//! model stream stops without waiting for the next chunk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cancellation token that can be checked or awaited by the runtime loop.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent `cancel()`
            // cannot slip between the two.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the cancel token of the running turn for each thread.
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Create and register a new cancel token for a thread.
    pub fn register(&self, thread_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens
            .lock()
            .insert(thread_id.to_owned(), token.clone());
        token
    }

    /// Cancel the running turn of a thread. Returns true if one was found.
    pub fn cancel(&self, thread_id: &str) -> bool {
        match self.tokens.lock().get(thread_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove the token when its turn completes.
    ///
    /// Only removes the entry if it still holds `token`; a newer turn on the
    /// same thread keeps its own registration.
    pub fn remove(&self, thread_id: &str, token: &CancelToken) {
        let mut tokens = self.tokens.lock();
        if tokens.get(thread_id).is_some_and(|t| t.same_as(token)) {
            tokens.remove(thread_id);
        }
    }

    /// Check if a thread has a running turn.
    pub fn is_running(&self, thread_id: &str) -> bool {
        self.tokens.lock().contains_key(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_token_lifecycle() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_map_register_and_cancel() {
        let map = CancelMap::new();
        let token = map.register("t1");
        assert!(map.is_running("t1"));

        assert!(map.cancel("t1"));
        assert!(token.is_cancelled());

        map.remove("t1", &token);
        assert!(!map.is_running("t1"));
        assert!(!map.cancel("t1"));
    }

    #[test]
    fn cancel_unknown_thread_returns_false() {
        let map = CancelMap::new();
        assert!(!map.cancel("does_not_exist"));
    }

    #[test]
    fn stale_remove_keeps_newer_registration() {
        let map = CancelMap::new();
        let old = map.register("t1");
        let new = map.register("t1");

        map.remove("t1", &old);
        assert!(map.is_running("t1"));

        map.cancel("t1");
        assert!(new.is_cancelled());
        assert!(!old.is_cancelled());
    }

    #[test]
    fn clone_shares_state() {
        let token = CancelToken::default();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already cancelled");
    }
}
