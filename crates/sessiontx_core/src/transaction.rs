//! Reentrant session transactions.
//!
//! Every high-level operation against the remote session runs inside a
//! transaction. A [`Transaction`] handle belongs to one logical call chain:
//! the first `begin` acquires the exclusive primitive, nested `begin`/`done`
//! pairs only move a counter, and the outermost `done` releases the primitive
//! and fires the chain's [`CompletionSignal`].
//!
//! ```
//! use sessiontx_core::{LockError, SessionConfig, SessionLock};
//!
//! let session = SessionLock::new(SessionConfig::default());
//! let value = session.tx(|tx| {
//!     // Nested operations reuse the same handle and never block.
//!     tx.tx(|_| Ok::<_, LockError>(21))
//!         .map(|v| v * 2)
//! })?;
//! assert_eq!(value, 42);
//! # Ok::<(), LockError>(())
//! ```

use crate::cancel::CancellationToken;
use crate::config::SessionConfig;
use crate::error::{LockError, LockResult};
use crate::exclusive::{ExclusiveLock, SessionMutex};
use crate::signal::CompletionSignal;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Coordinator serializing every transaction chain against one session.
///
/// Each session owns its own coordinator; independent sessions never share
/// a primitive unless one is passed explicitly to
/// [`with_primitive`](Self::with_primitive).
pub struct SessionLock {
    primitive: Arc<dyn ExclusiveLock>,
    config: SessionConfig,
}

impl SessionLock {
    /// Creates a coordinator backed by a fresh in-process [`SessionMutex`].
    pub fn new(config: SessionConfig) -> Self {
        Self::with_primitive(Arc::new(SessionMutex::new()), config)
    }

    /// Creates a coordinator backed by the given primitive.
    pub fn with_primitive(primitive: Arc<dyn ExclusiveLock>, config: SessionConfig) -> Self {
        Self { primitive, config }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Gets the underlying primitive.
    pub fn primitive(&self) -> &Arc<dyn ExclusiveLock> {
        &self.primitive
    }

    /// Creates a transaction handle for a new call chain.
    ///
    /// `signal` fires exactly once, after the chain's outermost `done`.
    pub fn transaction(&self, signal: CompletionSignal) -> Transaction {
        Transaction {
            id: NEXT_TX_ID.fetch_add(1, Ordering::Relaxed),
            primitive: Arc::clone(&self.primitive),
            default_label: self.config.default_label.clone(),
            initiator: Mutex::new(self.config.initiator.clone()),
            name: Mutex::new(String::new()),
            depth: AtomicI64::new(0),
            completed: AtomicBool::new(false),
            signal,
            cancel: CancellationToken::new(),
        }
    }

    /// Runs `operation` in a fresh transaction chain.
    pub fn tx<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
        E: From<LockError>,
    {
        self.transaction(CompletionSignal::new()).tx(operation)
    }
}

impl fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLock")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle for one logical transaction chain.
///
/// The handle is passed down to every nested operation of the chain. It is
/// single-use: once the outermost `done` has run, `begin` returns
/// [`LockError::Completed`]. Dropping a handle that still holds the session
/// releases it and fires the signal.
pub struct Transaction {
    id: u64,
    primitive: Arc<dyn ExclusiveLock>,
    default_label: String,
    initiator: Mutex<Option<String>>,
    /// Name the primitive was acquired under.
    name: Mutex<String>,
    /// Reentrancy count; the primitive is held exactly while it is positive.
    depth: AtomicI64,
    completed: AtomicBool,
    signal: CompletionSignal,
    cancel: CancellationToken,
}

impl Transaction {
    /// Gets the process-unique id of this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Gets the current nesting depth.
    pub fn depth(&self) -> i64 {
        self.depth.load(Ordering::SeqCst)
    }

    /// Returns true while the chain holds the session.
    pub fn is_active(&self) -> bool {
        self.depth() > 0
    }

    /// Returns true once the chain has ended.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Gets the name the primitive was acquired under.
    ///
    /// Empty until the first `begin`.
    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    /// Gets the completion signal of this chain.
    pub fn signal(&self) -> &CompletionSignal {
        &self.signal
    }

    /// Replaces the token that aborts a blocked acquire.
    ///
    /// Handles start with a token that is never cancelled.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Tags the chain with a diagnostic prefix.
    ///
    /// Only takes effect when called before the first `begin`.
    pub fn set_initiator(&self, initiator: impl Into<String>) -> &Self {
        *self.initiator.lock() = Some(initiator.into());
        self
    }

    /// Begins a transaction under the default label. `done` must follow.
    pub fn begin(&self) -> LockResult<&Self> {
        self.begin_named("")
    }

    /// Begins a transaction with a label. `done` must follow.
    ///
    /// The outermost call blocks until the primitive is acquired; nested calls
    /// return immediately. If the acquire fails nothing is held, the count is
    /// left unchanged and the completion signal does not fire.
    pub fn begin_named(&self, label: &str) -> LockResult<&Self> {
        if self.is_completed() {
            return Err(LockError::Completed { name: self.name() });
        }

        let previous = self.depth.fetch_add(1, Ordering::SeqCst);
        if previous > 0 {
            tracing::trace!(tx = self.id, label, depth = previous + 1, "reentrant begin");
            return Ok(self);
        }

        let name = self.compose_name(label);
        tracing::debug!(tx = self.id, name = %name, "acquiring session");
        if let Err(err) = self.primitive.acquire(&name, &self.cancel) {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(tx = self.id, name = %name, error = %err, "session acquire failed");
            return Err(err);
        }
        tracing::debug!(tx = self.id, name = %name, "session acquired");
        *self.name.lock() = name;
        Ok(self)
    }

    /// Ends the innermost transaction.
    ///
    /// The outermost call releases the primitive and fires the completion
    /// signal, even if the release itself fails; the release error is
    /// returned.
    ///
    /// # Panics
    ///
    /// Panics if called without a matching `begin`.
    pub fn done(&self) -> LockResult<()> {
        let previous = self.depth.fetch_sub(1, Ordering::SeqCst);
        if previous <= 0 {
            self.depth.fetch_add(1, Ordering::SeqCst);
            panic!(
                "transaction {} ({:?}): done() called without a matching begin()",
                self.id,
                self.name()
            );
        }
        if previous > 1 {
            tracing::trace!(tx = self.id, depth = previous - 1, "reentrant done");
            return Ok(());
        }
        self.finish()
    }

    /// Runs `operation` inside a transaction and ends it on every exit path.
    ///
    /// The operation's result is returned unchanged. A release failure after
    /// a successful operation is converted into `E`.
    pub fn tx<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<LockError>,
    {
        self.begin()?;
        let mut guard = DoneGuard {
            tx: self,
            armed: true,
        };
        let result = operation(self);
        guard.armed = false;
        let released = self.done();
        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), _) => Err(err),
        }
    }

    fn compose_name(&self, label: &str) -> String {
        let label = if label.is_empty() {
            self.default_label.as_str()
        } else {
            label
        };
        match self.initiator.lock().as_deref() {
            Some(initiator) if !initiator.is_empty() => format!("{initiator}:{label}"),
            _ => label.to_string(),
        }
    }

    /// Releases the primitive and fires the signal.
    fn finish(&self) -> LockResult<()> {
        let name = self.name();
        let released = self.primitive.release(&name);
        self.completed.store(true, Ordering::SeqCst);
        match &released {
            Ok(()) => tracing::debug!(tx = self.id, name = %name, "session released"),
            Err(err) => {
                tracing::error!(tx = self.id, name = %name, error = %err, "session release failed")
            }
        }
        self.signal.fire();
        released
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.depth.load(Ordering::SeqCst) > 0 {
            tracing::warn!(
                tx = self.id,
                name = %self.name(),
                depth = self.depth.load(Ordering::SeqCst),
                "transaction dropped while held, releasing"
            );
            self.depth.store(0, Ordering::SeqCst);
            let _ = self.finish();
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("depth", &self.depth())
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Ends the transaction if the operation unwinds.
struct DoneGuard<'a> {
    tx: &'a Transaction,
    armed: bool,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.tx.done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Counts calls and forwards to a real mutex.
    #[derive(Default)]
    struct CountingLock {
        inner: SessionMutex,
        acquires: AtomicUsize,
        releases: AtomicUsize,
        names: Mutex<Vec<String>>,
        fail_acquire: AtomicBool,
    }

    impl ExclusiveLock for CountingLock {
        fn acquire(&self, name: &str, cancel: &CancellationToken) -> LockResult<()> {
            if self.fail_acquire.load(Ordering::SeqCst) {
                return Err(LockError::primitive(name, "backend down"));
            }
            self.inner.acquire(name, cancel)?;
            self.acquires.fetch_add(1, Ordering::SeqCst);
            self.names.lock().push(name.to_string());
            Ok(())
        }

        fn release(&self, name: &str) -> LockResult<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            self.inner.release(name)
        }
    }

    fn session() -> (SessionLock, Arc<CountingLock>) {
        let lock = Arc::new(CountingLock::default());
        let session = SessionLock::with_primitive(lock.clone(), SessionConfig::default());
        (session, lock)
    }

    #[test]
    fn nested_begin_acquires_once() {
        let (session, lock) = session();
        let signal = CompletionSignal::new();
        let tx = session.transaction(signal.clone());

        tx.begin().unwrap();
        tx.begin_named("Inner").unwrap();
        tx.begin().unwrap();
        assert_eq!(tx.depth(), 3);

        tx.done().unwrap();
        tx.done().unwrap();
        assert!(!signal.is_fired());
        assert_eq!(lock.releases.load(Ordering::SeqCst), 0);

        tx.done().unwrap();
        assert!(signal.is_fired());
        assert_eq!(lock.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(lock.releases.load(Ordering::SeqCst), 1);
        assert!(tx.is_completed());
    }

    #[test]
    fn name_uses_default_label_and_initiator() {
        let (session, lock) = session();

        let tx = session.transaction(CompletionSignal::new());
        tx.begin().unwrap();
        tx.done().unwrap();

        let tx = session.transaction(CompletionSignal::new());
        tx.set_initiator("bot").begin_named("GetPlanets").unwrap();
        assert_eq!(tx.name(), "bot:GetPlanets");
        tx.done().unwrap();

        let tx = session.transaction(CompletionSignal::new());
        tx.set_initiator("bot").begin_named("").unwrap();
        tx.done().unwrap();

        assert_eq!(*lock.names.lock(), vec!["Tx", "bot:GetPlanets", "bot:Tx"]);
    }

    #[test]
    fn inner_label_does_not_rename() {
        let (session, _lock) = session();
        let tx = session.transaction(CompletionSignal::new());
        tx.begin_named("Outer").unwrap();
        tx.begin_named("Inner").unwrap();
        assert_eq!(tx.name(), "Outer");
        tx.done().unwrap();
        tx.done().unwrap();
    }

    #[test]
    fn config_initiator_applies_to_new_handles() {
        let session = SessionLock::new(SessionConfig::new().initiator("api"));
        let tx = session.transaction(CompletionSignal::new());
        tx.begin_named("Build").unwrap();
        assert_eq!(tx.name(), "api:Build");
        tx.done().unwrap();
    }

    #[test]
    #[should_panic(expected = "without a matching begin")]
    fn done_without_begin_panics() {
        let (session, _lock) = session();
        let tx = session.transaction(CompletionSignal::new());
        let _ = tx.done();
    }

    #[test]
    fn failed_acquire_skips_work_and_signal() {
        let (session, lock) = session();
        lock.fail_acquire.store(true, Ordering::SeqCst);
        let signal = CompletionSignal::new();
        let tx = session.transaction(signal.clone());

        let mut ran = false;
        let result: Result<(), LockError> = tx.tx(|_| {
            ran = true;
            Ok(())
        });

        assert!(matches!(result, Err(LockError::Primitive { .. })));
        assert!(!ran);
        assert_eq!(tx.depth(), 0);
        assert!(!signal.is_fired());
        assert_eq!(lock.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tx_returns_operation_error_and_releases() {
        #[derive(Debug, PartialEq)]
        enum OpError {
            Lock(LockError),
            Remote(&'static str),
        }
        impl From<LockError> for OpError {
            fn from(err: LockError) -> Self {
                OpError::Lock(err)
            }
        }

        let (session, lock) = session();
        let signal = CompletionSignal::new();
        let tx = session.transaction(signal.clone());

        let result: Result<(), OpError> = tx.tx(|_| Err(OpError::Remote("503")));
        assert_eq!(result, Err(OpError::Remote("503")));
        assert!(signal.is_fired());
        assert_eq!(lock.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tx_releases_on_panic() {
        let (session, lock) = session();
        let signal = CompletionSignal::new();
        let tx = session.transaction(signal.clone());

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), LockError> = tx.tx(|_| panic!("scraper blew up"));
        }));

        assert!(outcome.is_err());
        assert!(signal.is_fired());
        assert_eq!(lock.releases.load(Ordering::SeqCst), 1);
        assert!(!lock.inner.is_locked());
    }

    #[test]
    fn completed_handle_cannot_begin_again() {
        let (session, _lock) = session();
        let tx = session.transaction(CompletionSignal::new());
        tx.begin().unwrap();
        tx.done().unwrap();

        let err = tx.begin().unwrap_err();
        assert!(matches!(err, LockError::Completed { .. }));
    }

    #[test]
    fn dropping_held_handle_releases() {
        let (session, lock) = session();
        let signal = CompletionSignal::new();
        {
            let tx = session.transaction(signal.clone());
            tx.begin().unwrap();
            tx.begin().unwrap();
        }
        assert!(signal.is_fired());
        assert_eq!(lock.releases.load(Ordering::SeqCst), 1);
        assert!(!lock.inner.is_locked());
    }

    #[test]
    fn dropping_unused_handle_does_not_fire_signal() {
        let (session, lock) = session();
        let signal = CompletionSignal::new();
        drop(session.transaction(signal.clone()));
        assert!(!signal.is_fired());
        assert_eq!(lock.acquires.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_acquire_is_fatal_to_the_chain() {
        let session = SessionLock::new(SessionConfig::default());
        let holder = session.transaction(CompletionSignal::new());
        holder.begin_named("Holder").unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let signal = CompletionSignal::new();
        let waiter = session.transaction(signal.clone()).with_cancel(token);

        let err = waiter.begin().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(waiter.depth(), 0);
        assert!(!signal.is_fired());

        holder.done().unwrap();
    }

    #[test]
    fn ids_are_unique() {
        let (session, _lock) = session();
        let a = session.transaction(CompletionSignal::new());
        let b = session.transaction(CompletionSignal::new());
        assert_ne!(a.id(), b.id());
    }
}
