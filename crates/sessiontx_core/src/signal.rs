//! Single-fire completion signal.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Callback = Box<dyn FnOnce() + Send>;

struct SignalState {
    fired: bool,
    callbacks: Vec<Callback>,
}

struct SignalInner {
    state: Mutex<SignalState>,
    cond: Condvar,
}

/// Notification fired exactly once when a transaction chain ends.
///
/// The signal is created by whoever wants to observe the end of the chain
/// (typically a scheduler) and handed to
/// [`SessionLock::transaction`](crate::SessionLock::transaction). Clones share
/// the same state; only the first `fire` has any effect.
#[derive(Clone)]
pub struct CompletionSignal {
    inner: Arc<SignalInner>,
}

impl CompletionSignal {
    /// Creates an unfired signal.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                state: Mutex::new(SignalState {
                    fired: false,
                    callbacks: Vec::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Fires the signal.
    ///
    /// Returns true if this call fired it, false if it had already fired.
    /// Callbacks run on the calling thread after internal locks are released.
    pub fn fire(&self) -> bool {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.fired {
                return false;
            }
            state.fired = true;
            std::mem::take(&mut state.callbacks)
        };
        self.inner.cond.notify_all();
        for callback in callbacks {
            callback();
        }
        true
    }

    /// Returns true once the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.inner.state.lock().fired
    }

    /// Blocks until the signal fires.
    pub fn wait(&self) {
        let mut state = self.inner.state.lock();
        while !state.fired {
            self.inner.cond.wait(&mut state);
        }
    }

    /// Blocks until the signal fires or `timeout` elapses.
    ///
    /// Returns true if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.inner.state.lock();
        if !state.fired {
            let _ = self
                .inner
                .cond
                .wait_while_for(&mut state, |s| !s.fired, timeout);
        }
        state.fired
    }

    /// Runs `callback` once the signal fires, or immediately if it already has.
    pub fn on_fire<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.fired {
            drop(state);
            callback();
        } else {
            state.callbacks.push(Box::new(callback));
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}
