//! Stress helpers for concurrent chains.
//!
//! These helpers verify mutual exclusion under contention by tracking how
//! many chains are inside the protected section at once.

use sessiontx_core::{CompletionSignal, LockError, SessionLock, Transaction};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Chains that completed.
    pub completed: usize,
    /// Chains that failed, including chains that panicked.
    pub failed: usize,
    /// Chains that panicked.
    pub panicked: usize,
    /// Highest number of chains observed inside the protected section at once.
    pub max_concurrent: usize,
    /// Total duration.
    pub duration: Duration,
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of threads.
    pub threads: usize,
    /// Chains per thread.
    pub chains_per_thread: usize,
    /// Nested `tx` calls inside each chain.
    pub nesting: usize,
    /// Time spent inside the innermost section.
    pub hold: Duration,
    /// Panic inside every Nth chain of each thread. Zero disables.
    pub panic_every: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            chains_per_thread: 25,
            nesting: 3,
            hold: Duration::from_micros(50),
            panic_every: 0,
        }
    }
}

/// Runs concurrent nested chains through `session`.
pub fn run_concurrent_chains(session: Arc<SessionLock>, config: &StressConfig) -> StressTestResult {
    let inside = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let panicked = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let session = Arc::clone(&session);
            let inside = Arc::clone(&inside);
            let max_concurrent = Arc::clone(&max_concurrent);
            let completed = Arc::clone(&completed);
            let failed = Arc::clone(&failed);
            let panicked = Arc::clone(&panicked);
            let config = config.clone();
            thread::spawn(move || {
                for chain in 1..=config.chains_per_thread {
                    let tx = session.transaction(CompletionSignal::new());
                    tx.set_initiator(format!("worker-{t}"));
                    let should_panic = config.panic_every > 0 && chain % config.panic_every == 0;
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        tx.tx(|tx| {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_concurrent.fetch_max(now, Ordering::SeqCst);
                            let nested = if should_panic {
                                inside.fetch_sub(1, Ordering::SeqCst);
                                panic!("chain {chain} of worker-{t} panicked");
                            } else {
                                nest(tx, config.nesting, config.hold)
                            };
                            inside.fetch_sub(1, Ordering::SeqCst);
                            nested
                        })
                    }));
                    match result {
                        Ok(Ok(())) => {
                            completed.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(Err(_)) => {
                            failed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(_) => {
                            panicked.fetch_add(1, Ordering::SeqCst);
                            failed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        if let Err(payload) = handle.join() {
            panic::resume_unwind(payload);
        }
    }

    StressTestResult {
        completed: completed.load(Ordering::SeqCst),
        failed: failed.load(Ordering::SeqCst),
        panicked: panicked.load(Ordering::SeqCst),
        max_concurrent: max_concurrent.load(Ordering::SeqCst),
        duration: start.elapsed(),
    }
}

fn nest(tx: &Transaction, levels: usize, hold: Duration) -> Result<(), LockError> {
    if levels == 0 {
        thread::sleep(hold);
        return Ok(());
    }
    tx.tx(|tx| nest(tx, levels - 1, hold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::recording_session;

    #[test]
    fn concurrent_chains_are_exclusive() {
        let (session, lock) = recording_session();
        let config = StressConfig {
            threads: 4,
            chains_per_thread: 10,
            nesting: 2,
            hold: Duration::from_micros(100),
            panic_every: 0,
        };

        let result = run_concurrent_chains(Arc::new(session), &config);

        assert_eq!(result.completed, 40);
        assert_eq!(result.failed, 0);
        assert_eq!(result.max_concurrent, 1);
        assert_eq!(lock.acquire_count(), 40);
        assert_eq!(lock.release_count(), 40);
    }

    #[test]
    fn panicking_chains_count_as_failures() {
        let (session, lock) = recording_session();
        let config = StressConfig {
            threads: 2,
            chains_per_thread: 6,
            nesting: 1,
            hold: Duration::ZERO,
            panic_every: 3,
        };

        let result = run_concurrent_chains(Arc::new(session), &config);

        assert_eq!(result.panicked, 4);
        assert_eq!(result.failed, 4);
        assert_eq!(result.completed, 8);
        assert_eq!(result.max_concurrent, 1);
        // Unwinding still ends every chain.
        assert_eq!(lock.acquire_count(), 12);
        assert_eq!(lock.release_count(), 12);
        assert!(!lock.mutex().is_locked());
    }
}
