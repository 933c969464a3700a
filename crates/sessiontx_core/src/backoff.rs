//! Exponential backoff between retry attempts.
//!
//! The policy is meant to be called once before *every* attempt, including
//! the first one:
//!
//! ```
//! use sessiontx_core::{BackoffConfig, CancellationToken, ExponentialBackoff};
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::new(
//!     CancellationToken::new(),
//!     BackoffConfig::new(Duration::from_secs(60)),
//! );
//! backoff.wait(); // first call returns immediately
//! assert_eq!(backoff.current_delay(), Duration::from_secs(1));
//! ```
//!
//! The delay only grows once an attempt has failed and is about to be
//! retried. Call [`ExponentialBackoff::reset`] after a success.

use crate::cancel::CancellationToken;
use crate::clock::{Clock, SystemClock};
use crate::config::BackoffConfig;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What a call to [`ExponentialBackoff::wait`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// First call of a retry sequence; no sleep happened.
    Immediate,
    /// Slept for the full delay.
    Slept(Duration),
    /// The cancellation token fired before the delay elapsed.
    Cancelled,
}

impl WaitOutcome {
    /// Returns true if the wait was cut short by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitOutcome::Cancelled)
    }
}

/// Doubling delay between retries, capped by a ceiling.
///
/// With a one second unit and a 60 second ceiling, successive waits sleep
/// `0, 1, 2, 4, 8, 16, 32, 60, 60, ...` seconds.
pub struct ExponentialBackoff {
    cancel: CancellationToken,
    clock: Arc<dyn Clock>,
    config: BackoffConfig,
    /// Zero until the first wait of a sequence.
    current: Mutex<Duration>,
}

impl ExponentialBackoff {
    /// Creates a backoff sleeping on the system clock.
    pub fn new(cancel: CancellationToken, config: BackoffConfig) -> Self {
        Self::with_clock(cancel, Arc::new(SystemClock), config)
    }

    /// Creates a backoff sleeping on the given clock.
    pub fn with_clock(
        cancel: CancellationToken,
        clock: Arc<dyn Clock>,
        config: BackoffConfig,
    ) -> Self {
        Self {
            cancel,
            clock,
            config,
            current: Mutex::new(Duration::ZERO),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Gets the delay the next `wait` will sleep for.
    ///
    /// `Duration::ZERO` means the next wait returns immediately.
    pub fn current_delay(&self) -> Duration {
        *self.current.lock()
    }

    /// Waits before the next attempt.
    ///
    /// The first call after construction or [`reset`](Self::reset) returns
    /// immediately. Later calls sleep for the current delay and then double
    /// it. A cancelled sleep returns early and leaves the delay unchanged.
    pub fn wait(&self) -> WaitOutcome {
        let delay = {
            let mut current = self.current.lock();
            if current.is_zero() {
                *current = self.config.first_delay();
                return WaitOutcome::Immediate;
            }
            *current
        };

        tracing::trace!(delay_ms = delay.as_millis() as u64, "backoff sleeping");
        if !self.clock.sleep(delay, &self.cancel) {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "backoff cancelled");
            return WaitOutcome::Cancelled;
        }

        let mut current = self.current.lock();
        // A concurrent reset wins over the doubling.
        if !current.is_zero() {
            *current = self.config.next_delay(delay);
        }
        WaitOutcome::Slept(delay)
    }

    /// Restores the fast path: the next `wait` returns immediately.
    pub fn reset(&self) {
        *self.current.lock() = Duration::ZERO;
    }

    /// Runs `attempt` until it returns false, waiting between iterations.
    ///
    /// Stops as soon as the cancellation token fires.
    pub fn loop_forever<F>(&self, mut attempt: F)
    where
        F: FnMut() -> bool,
    {
        loop {
            if !attempt() {
                return;
            }
            self.wait();
            if self.cancel.is_cancelled() {
                return;
            }
        }
    }
}

impl fmt::Debug for ExponentialBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoff")
            .field("config", &self.config)
            .field("current", &self.current_delay())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
