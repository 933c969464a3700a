//! Lock fixtures.
//!
//! Provides an instrumented [`ExclusiveLock`] and helpers for building
//! sessions on top of it.

use parking_lot::Mutex;
use sessiontx_core::{
    CancellationToken, ExclusiveLock, LockError, LockResult, SessionConfig, SessionLock,
    SessionMutex,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// One call observed by a [`RecordingLock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// A successful acquire under the given name.
    Acquired(String),
    /// A release under the given name.
    Released(String),
    /// An acquire that returned an error.
    AcquireFailed(String),
}

/// Exclusive primitive that records every call and can inject failures.
///
/// Locking itself is delegated to a real [`SessionMutex`].
#[derive(Default)]
pub struct RecordingLock {
    inner: SessionMutex,
    acquires: AtomicUsize,
    releases: AtomicUsize,
    events: Mutex<Vec<LockEvent>>,
    fail_next_acquire: AtomicBool,
    fail_next_release: AtomicBool,
}

impl RecordingLock {
    /// Creates a new recording lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the wrapped mutex.
    pub fn mutex(&self) -> &SessionMutex {
        &self.inner
    }

    /// Number of successful acquires.
    pub fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    /// Number of releases.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// All observed events, in order.
    pub fn events(&self) -> Vec<LockEvent> {
        self.events.lock().clone()
    }

    /// Makes the next acquire fail with a primitive error.
    pub fn fail_next_acquire(&self) {
        self.fail_next_acquire.store(true, Ordering::SeqCst);
    }

    /// Makes the next release fail with a primitive error (the lock is still freed).
    pub fn fail_next_release(&self) {
        self.fail_next_release.store(true, Ordering::SeqCst);
    }
}

impl ExclusiveLock for RecordingLock {
    fn acquire(&self, name: &str, cancel: &CancellationToken) -> LockResult<()> {
        let result = if self.fail_next_acquire.swap(false, Ordering::SeqCst) {
            Err(LockError::primitive(name, "injected acquire failure"))
        } else {
            self.inner.acquire(name, cancel)
        };

        let event = match &result {
            Ok(()) => {
                self.acquires.fetch_add(1, Ordering::SeqCst);
                LockEvent::Acquired(name.to_string())
            }
            Err(_) => LockEvent::AcquireFailed(name.to_string()),
        };
        self.events.lock().push(event);
        result
    }

    fn release(&self, name: &str) -> LockResult<()> {
        // Record before unlocking so the next holder's acquire is logged after.
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.events.lock().push(LockEvent::Released(name.to_string()));
        self.inner.release(name)?;
        if self.fail_next_release.swap(false, Ordering::SeqCst) {
            return Err(LockError::primitive(name, "injected release failure"));
        }
        Ok(())
    }
}

/// Builds a session over a fresh [`RecordingLock`].
pub fn recording_session() -> (SessionLock, Arc<RecordingLock>) {
    recording_session_with(SessionConfig::default())
}

/// Builds a session over a fresh [`RecordingLock`] with the given config.
pub fn recording_session_with(config: SessionConfig) -> (SessionLock, Arc<RecordingLock>) {
    let lock = Arc::new(RecordingLock::new());
    let session = SessionLock::with_primitive(lock.clone(), config);
    (session, lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessiontx_core::CompletionSignal;

    #[test]
    fn records_events_in_order() {
        let (session, lock) = recording_session();
        let tx = session.transaction(CompletionSignal::new());
        tx.begin_named("A").unwrap();
        tx.done().unwrap();

        assert_eq!(
            lock.events(),
            vec![
                LockEvent::Acquired("A".into()),
                LockEvent::Released("A".into())
            ]
        );
        assert_eq!(lock.acquire_count(), 1);
        assert_eq!(lock.release_count(), 1);
    }

    #[test]
    fn injected_acquire_failure_is_one_shot() {
        let (session, lock) = recording_session();
        lock.fail_next_acquire();

        let tx = session.transaction(CompletionSignal::new());
        assert!(tx.begin().is_err());
        tx.begin().unwrap();
        tx.done().unwrap();

        assert_eq!(
            lock.events(),
            vec![
                LockEvent::AcquireFailed("Tx".into()),
                LockEvent::Acquired("Tx".into()),
                LockEvent::Released("Tx".into())
            ]
        );
    }
}
