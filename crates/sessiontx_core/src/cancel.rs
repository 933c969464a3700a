//! Cooperative cancellation token.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Callback = Box<dyn FnOnce() + Send>;

struct TokenState {
    cancelled: bool,
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

struct TokenInner {
    state: Mutex<TokenState>,
    cond: Condvar,
}

/// A cloneable cancellation flag that sleepers and waiters can observe.
///
/// All clones share the same state. Cancellation is permanent.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                state: Mutex::new(TokenState {
                    cancelled: false,
                    next_id: 0,
                    callbacks: Vec::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Cancels the token, waking every sleeper and running registered callbacks.
    pub fn cancel(&self) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.callbacks)
        };
        self.inner.cond.notify_all();
        for (_, callback) in callbacks {
            callback();
        }
    }

    /// Returns true once `cancel` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    /// Blocks for up to `timeout`, returning early if the token is cancelled.
    ///
    /// Returns true if the token is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.inner.state.lock();
        while !state.cancelled {
            match deadline {
                Some(deadline) => {
                    if self.inner.cond.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.inner.cond.wait(&mut state),
            }
        }
        state.cancelled
    }

    /// Registers a callback run once when the token is cancelled.
    ///
    /// If the token is already cancelled the callback runs immediately. The
    /// callback is dropped without running when the returned registration is
    /// dropped first.
    pub fn on_cancel<F>(&self, callback: F) -> CancelRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        if state.cancelled {
            drop(state);
            callback();
        } else {
            state.callbacks.push((id, Box::new(callback)));
        }
        CancelRegistration {
            inner: Arc::clone(&self.inner),
            id,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Keeps a cancel callback registered; dropping it unregisters the callback.
#[must_use = "dropping the registration unregisters the callback"]
pub struct CancelRegistration {
    inner: Arc<TokenInner>,
    id: u64,
}

impl Drop for CancelRegistration {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.callbacks.retain(|(id, _)| *id != self.id);
    }
}
