//! # sessiontx testkit
//!
//! Test utilities for sessiontx.
//!
//! This crate provides:
//! - A recording lock primitive that counts and logs acquire/release calls
//! - A manual clock that records backoff sleeps instead of sleeping
//! - Property-based generators for nested begin/done plans
//! - Stress helpers that run concurrent chains and check mutual exclusion
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sessiontx_testkit::prelude::*;
//!
//! #[test]
//! fn nested_chain_acquires_once() {
//!     let (session, lock) = recording_session();
//!     session.tx(|tx| tx.tx(|_| Ok::<_, LockError>(()))).unwrap();
//!     assert_eq!(lock.acquire_count(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use clock::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
