//! # sessiontx core
//!
//! Serialization and retry pacing for clients that drive a single stateful
//! remote session.
//!
//! This crate provides:
//! - [`SessionLock`]: a reentrant, named, at-most-one-active-transaction
//!   coordinator over an injected [`ExclusiveLock`] primitive
//! - [`Transaction`]: the per-chain handle (`begin`, `begin_named`, `done`, `tx`)
//! - [`CompletionSignal`]: the exactly-once notification fired when a chain ends
//! - [`ExponentialBackoff`]: cancelable doubling delay between retries
//!
//! ## Key Invariants
//!
//! - The primitive is held exactly while a chain's reentrancy count is positive
//! - Nested calls on the same handle never block each other
//! - The completion signal fires once, after the outermost release
//! - `done` without `begin` is a fatal contract violation
//! - Mutual exclusion only: blocked acquirers are not served in any particular order

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod cancel;
mod clock;
mod config;
mod error;
mod exclusive;
mod signal;
mod transaction;

pub use backoff::{ExponentialBackoff, WaitOutcome};
pub use cancel::{CancelRegistration, CancellationToken};
pub use clock::{Clock, SystemClock};
pub use config::{BackoffConfig, SessionConfig, DEFAULT_LABEL, MIN_BACKOFF_UNIT};
pub use error::{LockError, LockResult};
pub use exclusive::{ExclusiveLock, LockStatus, SessionMutex};
pub use signal::CompletionSignal;
pub use transaction::{SessionLock, Transaction};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
