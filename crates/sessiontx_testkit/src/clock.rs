//! Simulated clock for backoff tests.

use parking_lot::Mutex;
use sessiontx_core::{CancellationToken, Clock};
use std::time::Duration;

/// Clock that records requested sleeps and returns without waiting.
///
/// A sleep requested on a cancelled token is not recorded and reports
/// cancellation, like a real sleep interrupted before it started.
#[derive(Debug, Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Creates a clock with no recorded sleeps.
    pub fn new() -> Self {
        Self::default()
    }

    /// All completed sleeps, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    /// Total simulated time slept.
    pub fn elapsed(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }

    /// Forgets recorded sleeps.
    pub fn clear(&self) {
        self.sleeps.lock().clear();
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.sleeps.lock().push(duration);
        true
    }
}
