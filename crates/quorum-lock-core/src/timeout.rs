//! Timeout value helpers.

use std::time::Duration;

use tokio::time::Instant;

/// Represents a timeout duration for lock operations.
///
/// - `Some(duration)` - Wait up to this duration
/// - `None` - Wait indefinitely
pub type Timeout = Option<Duration>;

/// Internal helper for timeout calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutValue {
    millis: i64, // -1 for infinite
}

impl TimeoutValue {
    pub const INFINITE: Self = Self { millis: -1 };
    pub const ZERO: Self = Self { millis: 0 };

    pub fn is_infinite(&self) -> bool {
        self.millis < 0
    }

    pub fn is_zero(&self) -> bool {
        self.millis == 0
    }

    pub fn as_duration(&self) -> Option<Duration> {
        if self.is_infinite() {
            None
        } else {
            Some(Duration::from_millis(self.millis as u64))
        }
    }

    /// Point in time at which a timeout started at `start` runs out.
    ///
    /// Returns `None` for infinite timeouts and for deadlines too far away
    /// to represent.
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        self.as_duration().and_then(|d| start.checked_add(d))
    }
}

impl From<Option<Duration>> for TimeoutValue {
    fn from(timeout: Option<Duration>) -> Self {
        match timeout {
            None => Self::INFINITE,
            Some(d) => Self {
                millis: i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
            },
        }
    }
}

impl From<Duration> for TimeoutValue {
    fn from(timeout: Duration) -> Self {
        Self::from(Some(timeout))
    }
}
