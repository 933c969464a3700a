//! Exclusive-lock primitive guarding the session.
//!
//! [`SessionLock`](crate::SessionLock) only sequences calls to a primitive;
//! it never owns the session itself. Any backend (an in-process mutex, a
//! distributed lock) can sit behind the [`ExclusiveLock`] trait.

use crate::cancel::CancellationToken;
use crate::error::{LockError, LockResult};
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

/// Acquire/release keyed by transaction name.
///
/// Implementations provide mutual exclusion only; nothing here promises
/// fairness among blocked acquirers.
pub trait ExclusiveLock: Send + Sync {
    /// Blocks until the primitive is held under `name`.
    ///
    /// Implementations that can observe `cancel` should stop waiting when it
    /// fires and return [`LockError::Cancelled`].
    fn acquire(&self, name: &str, cancel: &CancellationToken) -> LockResult<()>;

    /// Makes the primitive available to the next waiter.
    ///
    /// Called exactly once per successful acquire and never blocks.
    fn release(&self, name: &str) -> LockResult<()>;
}

impl<L: ExclusiveLock + ?Sized> ExclusiveLock for Arc<L> {
    fn acquire(&self, name: &str, cancel: &CancellationToken) -> LockResult<()> {
        (**self).acquire(name, cancel)
    }

    fn release(&self, name: &str) -> LockResult<()> {
        (**self).release(name)
    }
}

/// Snapshot of the lock state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockStatus {
    /// Whether a transaction currently holds the session.
    pub locked: bool,
    /// Name of the transaction that last locked or unlocked the session.
    pub actor: String,
}

type StateCallback = Arc<dyn Fn(bool, &str) + Send + Sync>;

#[derive(Default)]
struct MutexState {
    holder: Option<String>,
    last_actor: String,
}

struct MutexInner {
    state: Mutex<MutexState>,
    cond: Condvar,
    callbacks: RwLock<Vec<StateCallback>>,
}

/// In-process exclusive primitive.
///
/// Clones share the same lock. State-change callbacks receive
/// `(locked, actor)` on every lock and unlock.
#[derive(Clone)]
pub struct SessionMutex {
    inner: Arc<MutexInner>,
}

impl SessionMutex {
    /// Creates an unlocked primitive.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MutexInner {
                state: Mutex::new(MutexState::default()),
                cond: Condvar::new(),
                callbacks: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Returns true if a transaction holds the session.
    pub fn is_locked(&self) -> bool {
        self.inner.state.lock().holder.is_some()
    }

    /// Gets the name of the current holder.
    pub fn holder(&self) -> Option<String> {
        self.inner.state.lock().holder.clone()
    }

    /// Gets the current lock status.
    pub fn status(&self) -> LockStatus {
        let state = self.inner.state.lock();
        LockStatus {
            locked: state.holder.is_some(),
            actor: state.last_actor.clone(),
        }
    }

    /// Registers a callback invoked with `(locked, actor)` on every transition.
    ///
    /// Callbacks run on the thread that locked or unlocked, after the
    /// internal state lock is released.
    pub fn on_state_change<F>(&self, callback: F)
    where
        F: Fn(bool, &str) + Send + Sync + 'static,
    {
        self.inner.callbacks.write().push(Arc::new(callback));
    }

    fn state_changed(&self, locked: bool, actor: &str) {
        let callbacks = self.inner.callbacks.read().clone();
        for callback in callbacks {
            callback(locked, actor);
        }
    }
}

impl Default for SessionMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMutex")
            .field("status", &self.status())
            .finish()
    }
}

impl ExclusiveLock for SessionMutex {
    fn acquire(&self, name: &str, cancel: &CancellationToken) -> LockResult<()> {
        // Wake blocked acquirers so they can notice the cancellation.
        let inner = Arc::clone(&self.inner);
        let _registration = cancel.on_cancel(move || {
            let _state = inner.state.lock();
            inner.cond.notify_all();
        });

        {
            let mut state = self.inner.state.lock();
            loop {
                if cancel.is_cancelled() {
                    return Err(LockError::Cancelled {
                        name: name.to_string(),
                    });
                }
                if state.holder.is_none() {
                    state.holder = Some(name.to_string());
                    state.last_actor = name.to_string();
                    break;
                }
                self.inner.cond.wait(&mut state);
            }
        }

        self.state_changed(true, name);
        Ok(())
    }

    fn release(&self, name: &str) -> LockResult<()> {
        {
            let mut state = self.inner.state.lock();
            match state.holder.as_deref() {
                None => {
                    return Err(LockError::NotHeld {
                        name: name.to_string(),
                    })
                }
                Some(holder) if holder != name => {
                    return Err(LockError::HolderMismatch {
                        expected: holder.to_string(),
                        actual: name.to_string(),
                    })
                }
                Some(_) => {}
            }
            state.holder = None;
            state.last_actor = name.to_string();
        }
        // Every waiter rechecks; cancelled ones drop out of the race.
        self.inner.cond.notify_all();

        self.state_changed(false, name);
        Ok(())
    }
}
