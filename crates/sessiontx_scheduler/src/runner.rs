//! Priority task runner.
//!
//! Callers ask for a transaction with [`TaskRunner::with_priority`] and block
//! until their turn. Only one dispatched transaction exists at a time; the
//! next ticket is handed out when the previous chain's completion signal
//! fires. Among pending tickets the highest priority wins, and tickets of
//! equal priority are served in arrival order.

use crate::error::{SchedulerError, SchedulerResult};
use crate::priority::{Priority, TasksOverview};
use parking_lot::{Condvar, Mutex};
use sessiontx_core::{CompletionSignal, LockError, SessionLock, Transaction};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    priority: Priority,
    seq: u64,
}

impl Ord for Ticket {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap: higher priority first, then older tickets.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ticket {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueState {
    pending: BinaryHeap<Ticket>,
    /// A dispatched transaction has not finished yet.
    busy: bool,
    next_seq: u64,
    closed: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    cond: Condvar,
}

/// Frees the dispatch slot once, whichever of signal or drop comes first.
struct Slot {
    shared: Arc<Shared>,
    freed: AtomicBool,
}

impl Slot {
    fn free(&self) {
        if self.freed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.queue.lock().busy = false;
        self.shared.cond.notify_all();
    }
}

/// Serializes callers onto a [`SessionLock`] in priority order.
pub struct TaskRunner {
    session: Arc<SessionLock>,
    shared: Arc<Shared>,
}

impl TaskRunner {
    /// Creates a runner dispatching transactions of `session`.
    pub fn new(session: Arc<SessionLock>) -> Self {
        Self {
            session,
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState::default()),
                cond: Condvar::new(),
            }),
        }
    }

    /// Gets the session this runner feeds.
    pub fn session(&self) -> &Arc<SessionLock> {
        &self.session
    }

    /// Queues a task and blocks until it is dispatched.
    ///
    /// The returned transaction has not begun yet; the caller runs its chain
    /// on it (usually through `tx`). The next task is dispatched once this
    /// chain completes or the handle is dropped.
    pub fn with_priority(&self, priority: Priority) -> SchedulerResult<ScheduledTransaction> {
        let mut queue = self.shared.queue.lock();
        if queue.closed {
            return Err(SchedulerError::Closed);
        }

        let ticket = Ticket {
            priority,
            seq: queue.next_seq,
        };
        queue.next_seq += 1;
        queue.pending.push(ticket);
        tracing::trace!(%priority, seq = ticket.seq, pending = queue.pending.len(), "task queued");

        loop {
            if queue.closed {
                queue.pending.retain(|t| t.seq != ticket.seq);
                return Err(SchedulerError::Closed);
            }
            if !queue.busy && queue.pending.peek() == Some(&ticket) {
                queue.pending.pop();
                queue.busy = true;
                break;
            }
            self.shared.cond.wait(&mut queue);
        }
        let remaining = queue.pending.len();
        drop(queue);

        tracing::debug!(%priority, seq = ticket.seq, pending = remaining, "task dispatched");

        let slot = Arc::new(Slot {
            shared: Arc::clone(&self.shared),
            freed: AtomicBool::new(false),
        });
        let signal = CompletionSignal::new();
        {
            let slot = Arc::clone(&slot);
            signal.on_fire(move || slot.free());
        }

        Ok(ScheduledTransaction {
            tx: self.session.transaction(signal),
            priority,
            slot,
        })
    }

    /// Queues a task and runs `operation` in its transaction.
    pub fn tx<T, E, F>(&self, priority: Priority, operation: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
        E: From<SchedulerError> + From<LockError>,
    {
        let scheduled = self.with_priority(priority)?;
        scheduled.tx(operation)
    }

    /// Counts pending tasks per priority.
    pub fn tasks(&self) -> TasksOverview {
        let queue = self.shared.queue.lock();
        let mut overview = TasksOverview::default();
        for ticket in queue.pending.iter() {
            overview.count(ticket.priority);
        }
        overview
    }

    /// Returns true while a dispatched transaction is running.
    pub fn is_busy(&self) -> bool {
        self.shared.queue.lock().busy
    }

    /// Stops dispatching; pending and future callers get [`SchedulerError::Closed`].
    ///
    /// The transaction already dispatched (if any) is unaffected.
    pub fn shutdown(&self) {
        let pending = {
            let mut queue = self.shared.queue.lock();
            queue.closed = true;
            queue.pending.len()
        };
        self.shared.cond.notify_all();
        tracing::debug!(pending, "task runner shut down");
    }

    /// Returns true after `shutdown`.
    pub fn is_closed(&self) -> bool {
        self.shared.queue.lock().closed
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("tasks", &self.tasks())
            .field("busy", &self.is_busy())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A transaction handed out by the runner.
///
/// Dereferences to the underlying [`Transaction`].
pub struct ScheduledTransaction {
    tx: Transaction,
    priority: Priority,
    slot: Arc<Slot>,
}

impl ScheduledTransaction {
    /// Priority the task was queued with.
    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl Deref for ScheduledTransaction {
    type Target = Transaction;

    fn deref(&self) -> &Transaction {
        &self.tx
    }
}

impl Drop for ScheduledTransaction {
    fn drop(&mut self) {
        // Covers handles that never ran a chain or failed to acquire.
        self.slot.free();
    }
}

impl fmt::Debug for ScheduledTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTransaction")
            .field("priority", &self.priority)
            .field("tx", &self.tx)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessiontx_core::SessionConfig;
    use std::thread;
    use std::time::Duration;

    fn runner() -> Arc<TaskRunner> {
        Arc::new(TaskRunner::new(Arc::new(SessionLock::new(
            SessionConfig::default(),
        ))))
    }

    fn wait_for_pending(runner: &TaskRunner, total: u64) {
        for _ in 0..500 {
            if runner.tasks().total == total {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("expected {total} pending tasks, got {:?}", runner.tasks());
    }

    #[test]
    fn ticket_order() {
        let low_old = Ticket {
            priority: Priority::Low,
            seq: 0,
        };
        let low_new = Ticket {
            priority: Priority::Low,
            seq: 5,
        };
        let critical = Ticket {
            priority: Priority::Critical,
            seq: 9,
        };
        let mut heap = BinaryHeap::from(vec![low_new, critical, low_old]);
        assert_eq!(heap.pop(), Some(critical));
        assert_eq!(heap.pop(), Some(low_old));
        assert_eq!(heap.pop(), Some(low_new));
    }

    #[test]
    fn idle_runner_dispatches_immediately() {
        let runner = runner();
        let result: Result<u32, SchedulerError> = runner.tx(Priority::Normal, |tx| {
            assert!(tx.is_active());
            Ok(7)
        });
        assert_eq!(result, Ok(7));
        assert!(!runner.is_busy());
    }

    #[test]
    fn next_task_waits_for_completion() {
        let runner = runner();
        let first = runner.with_priority(Priority::Low).unwrap();
        assert!(runner.is_busy());

        let second = {
            let runner = Arc::clone(&runner);
            thread::spawn(move || {
                let scheduled = runner.with_priority(Priority::Critical).unwrap();
                scheduled.priority()
            })
        };

        wait_for_pending(&runner, 1);
        assert_eq!(runner.tasks().critical, 1);

        first.begin().unwrap();
        first.done().unwrap();
        assert_eq!(second.join().unwrap(), Priority::Critical);
        drop(first);
    }

    #[test]
    fn dropped_handle_frees_the_slot() {
        let runner = runner();
        let unused = runner.with_priority(Priority::Normal).unwrap();
        assert!(runner.is_busy());
        drop(unused);
        assert!(!runner.is_busy());

        let result: Result<(), SchedulerError> = runner.tx(Priority::Normal, |_| Ok(()));
        assert!(result.is_ok());
    }

    #[test]
    fn shutdown_rejects_pending_and_new_tasks() {
        let runner = runner();
        let holder = runner.with_priority(Priority::Normal).unwrap();

        let waiter = {
            let runner = Arc::clone(&runner);
            thread::spawn(move || runner.with_priority(Priority::Low).map(|_| ()))
        };
        wait_for_pending(&runner, 1);

        runner.shutdown();
        assert_eq!(waiter.join().unwrap(), Err(SchedulerError::Closed));
        assert_eq!(runner.tasks().total, 0);
        assert!(matches!(
            runner.with_priority(Priority::Critical),
            Err(SchedulerError::Closed)
        ));
        drop(holder);
    }
}
