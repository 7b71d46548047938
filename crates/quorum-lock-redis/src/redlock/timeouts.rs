//! RedLock timeout calculations.

use std::time::Duration;

use quorum_lock_core::timeout::TimeoutValue;

/// Timeout configuration for RedLock algorithm.
///
/// Derives the per-node request budget from the lease expiry and the
/// minimum validity that must remain once quorum is reached.
#[derive(Debug, Clone)]
pub struct RedLockTimeouts {
    /// Lock expiry time (TTL set on Redis keys).
    pub expiry: Duration,
    /// Minimum validity time required after acquisition.
    ///
    /// This accounts for clock drift in multi-server scenarios.
    pub min_validity: Duration,
}

impl RedLockTimeouts {
    /// Creates a new timeout configuration.
    pub fn new(expiry: Duration, min_validity: Duration) -> Self {
        Self {
            expiry,
            min_validity,
        }
    }

    /// Calculates the acquire timeout.
    ///
    /// This is the maximum time a single node request may take while still
    /// leaving at least `min_validity` on the lease once acquired.
    pub fn acquire_timeout(&self) -> TimeoutValue {
        if self.expiry > self.min_validity {
            TimeoutValue::from(Some(self.expiry - self.min_validity))
        } else {
            TimeoutValue::ZERO
        }
    }

    /// The acquire timeout as a concrete per-request budget.
    pub fn node_request_budget(&self) -> Duration {
        self.acquire_timeout().as_duration().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let timeouts = RedLockTimeouts::new(Duration::from_secs(30), Duration::from_secs(27));
        assert_eq!(timeouts.node_request_budget(), Duration::from_secs(3));
    }

    #[test]
    fn test_min_validity_above_expiry_leaves_no_budget() {
        let timeouts = RedLockTimeouts::new(Duration::from_secs(5), Duration::from_secs(10));
        assert!(timeouts.acquire_timeout().is_zero());
        assert_eq!(timeouts.node_request_budget(), Duration::ZERO);
    }
}
