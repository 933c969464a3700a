//! Error types for the session lock.

use thiserror::Error;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur while acquiring or releasing the session.
///
/// Every variant is fatal to the transaction that observed it: a failed
/// acquire means the protected work must not run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// The acquire wait was aborted by the transaction's cancellation token.
    #[error("acquire of {name:?} cancelled")]
    Cancelled {
        /// Name of the transaction that was waiting.
        name: String,
    },

    /// Release was requested while nothing holds the primitive.
    #[error("release of {name:?} but the session is not held")]
    NotHeld {
        /// Name passed to release.
        name: String,
    },

    /// Release was requested under a different name than the holder.
    #[error("release by {actual:?} but the session is held by {expected:?}")]
    HolderMismatch {
        /// Current holder.
        expected: String,
        /// Name passed to release.
        actual: String,
    },

    /// The handle already finished its chain and cannot be reused.
    #[error("transaction {name:?} already completed")]
    Completed {
        /// Name of the finished transaction.
        name: String,
    },

    /// An external primitive failed (lost connectivity, backend error).
    #[error("lock primitive failed for {name:?}: {message}")]
    Primitive {
        /// Name of the transaction.
        name: String,
        /// Error message from the primitive.
        message: String,
    },
}

impl LockError {
    /// Creates a primitive failure error.
    pub fn primitive(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Primitive {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error came from a cancelled acquire.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LockError::Cancelled { .. })
    }
}
