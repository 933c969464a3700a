//! Sleep source for backoff.

use crate::cancel::CancellationToken;
use std::time::Duration;

/// Something that can sleep cooperatively.
///
/// Swapping the clock lets tests observe the requested delays without
/// actually waiting for them.
pub trait Clock: Send + Sync {
    /// Sleeps for `duration` unless `cancel` fires first.
    ///
    /// Returns true if the full duration elapsed, false if cancelled.
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool;
}

/// Wall-clock sleeping, interruptible through the cancellation token.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        !cancel.wait_timeout(duration)
    }
}
