//! # sessiontx scheduler
//!
//! Priority task runner that decides which queued operation attempts the
//! session next.
//!
//! The runner only relies on the session lock's public contract:
//! - it hands each dispatched task a fresh [`CompletionSignal`](sessiontx_core::CompletionSignal)
//! - it dispatches the next task once that signal fires
//! - it reports how many tasks are waiting, per priority
//!
//! Ordering lives here, not in the lock: the lock guarantees mutual
//! exclusion, the runner decides who gets to contend for it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod priority;
mod runner;

pub use error::{SchedulerError, SchedulerResult};
pub use priority::{Priority, TasksOverview};
pub use runner::{ScheduledTransaction, TaskRunner};
