//! Error types for the task runner.

use sessiontx_core::LockError;
use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors that can occur while scheduling a task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The runner was shut down before the task was dispatched.
    #[error("task runner is shut down")]
    Closed,

    /// The dispatched transaction failed to acquire or release the session.
    #[error("session lock error: {0}")]
    Lock(#[from] LockError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(SchedulerError::Closed.to_string(), "task runner is shut down");

        let err: SchedulerError = LockError::NotHeld { name: "Tx".into() }.into();
        assert!(err.to_string().starts_with("session lock error"));
    }
}
