//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use sessiontx_core::{CancellationToken, Clock, LockError, Transaction};
use std::time::Duration;

/// Clock whose sleeps return immediately without recording anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantClock;

impl Clock for InstantClock {
    fn sleep(&self, _duration: Duration, cancel: &CancellationToken) -> bool {
        !cancel.is_cancelled()
    }
}

/// Runs `levels` nested `tx` calls on the same handle.
pub fn nest(tx: &Transaction, levels: usize) -> Result<(), LockError> {
    if levels == 0 {
        return Ok(());
    }
    tx.tx(|tx| nest(tx, levels - 1))
}

/// Labels used for named sub-calls.
pub fn labels(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("Step{i}")).collect()
}
