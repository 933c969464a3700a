//! Configuration for sessions and backoff.

use std::time::Duration;

/// Label used by `begin()` and by `begin_named("")`.
pub const DEFAULT_LABEL: &str = "Tx";

/// Configuration for a [`SessionLock`](crate::SessionLock).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Label for transactions started without an explicit name.
    pub default_label: String,

    /// Initiator applied to every new transaction handle.
    ///
    /// A handle can still override it with `set_initiator` before its
    /// first `begin`.
    pub initiator: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_label: DEFAULT_LABEL.to_string(),
            initiator: None,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default label.
    #[must_use]
    pub fn default_label(mut self, label: impl Into<String>) -> Self {
        self.default_label = label.into();
        self
    }

    /// Sets the default initiator.
    #[must_use]
    pub fn initiator(mut self, initiator: impl Into<String>) -> Self {
        self.initiator = Some(initiator.into());
        self
    }
}

/// Smallest unit a backoff paces with; a zero unit is raised to this.
pub const MIN_BACKOFF_UNIT: Duration = Duration::from_millis(1);

/// Configuration for [`ExponentialBackoff`](crate::ExponentialBackoff).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// First non-zero delay. Each completed sleep doubles the delay.
    pub unit: Duration,

    /// Ceiling for the delay. `Duration::ZERO` means unbounded.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            max_delay: Duration::ZERO,
        }
    }
}

impl BackoffConfig {
    /// Creates a configuration with a one second unit and the given ceiling.
    #[must_use]
    pub fn new(max_delay: Duration) -> Self {
        Self {
            max_delay,
            ..Self::default()
        }
    }

    /// Creates a configuration whose ceiling is `max_units` units.
    ///
    /// Zero means unbounded.
    #[must_use]
    pub fn from_max_units(unit: Duration, max_units: u32) -> Self {
        Self {
            unit,
            max_delay: unit.saturating_mul(max_units),
        }
    }

    /// Sets the base unit.
    ///
    /// A zero unit is treated as [`MIN_BACKOFF_UNIT`].
    #[must_use]
    pub const fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Sets the ceiling.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Returns true if the delay grows without bound.
    pub fn is_unbounded(&self) -> bool {
        self.max_delay.is_zero()
    }

    /// Returns the delay of the first sleep of a retry sequence.
    ///
    /// This is the unit, at least [`MIN_BACKOFF_UNIT`] and at most the ceiling.
    pub fn first_delay(&self) -> Duration {
        let unit = self.unit.max(MIN_BACKOFF_UNIT);
        if self.is_unbounded() {
            unit
        } else {
            unit.min(self.max_delay)
        }
    }

    /// Returns the delay that follows `current` after a completed sleep.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let doubled = current.saturating_mul(2);
        if self.is_unbounded() {
            doubled
        } else {
            doubled.min(self.max_delay)
        }
    }
}
