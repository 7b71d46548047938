//! Lock timing and naming options.

use std::time::Duration;

use quorum_lock_core::error::{LockError, LockResult};

use crate::redlock::RedLockTimeouts;

/// Default prefix prepended to lock names to form the storage key.
pub const DEFAULT_KEY_PREFIX: &str = "quorum-lock:";

/// Timing and naming options shared by every lock a provider creates.
#[derive(Debug, Clone)]
pub struct RedLockOptions {
    /// TTL set on each node's key; the lease lapses after this without renewal.
    pub expiry: Duration,
    /// How often the renewal task resets the TTL.
    pub extension_cadence: Duration,
    /// Validity that must remain once quorum is reached. Each node request
    /// may take at most `expiry - min_validity`.
    pub min_validity: Duration,
    /// Pause between attempts in [`acquire`](quorum_lock_core::DistributedLock::acquire).
    pub try_lock_interval: Duration,
    /// Prepended to each lock name to form the key stored on the nodes.
    pub key_prefix: String,
}

impl Default for RedLockOptions {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(30),
            extension_cadence: Duration::from_secs(10),
            min_validity: Duration::from_millis(27000), // 90% of expiry
            try_lock_interval: Duration::from_secs(1),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl RedLockOptions {
    /// Options with `expiry`, renewing every third of it and keeping the
    /// default 90% validity margin.
    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            expiry,
            extension_cadence: expiry / 3,
            min_validity: expiry / 10 * 9,
            ..Self::default()
        }
    }

    pub(crate) fn timeouts(&self) -> RedLockTimeouts {
        RedLockTimeouts::new(self.expiry, self.min_validity)
    }

    /// Rejects option combinations under which no lock could be held.
    pub fn validate(&self) -> LockResult<()> {
        if self.expiry.is_zero() {
            return Err(LockError::InvalidConfiguration(
                "expiry must be greater than zero".to_string(),
            ));
        }
        if self.extension_cadence.is_zero() || self.extension_cadence >= self.expiry {
            return Err(LockError::InvalidConfiguration(format!(
                "extension cadence {:?} must be between zero and the expiry {:?}",
                self.extension_cadence, self.expiry
            )));
        }
        if self.min_validity >= self.expiry {
            return Err(LockError::InvalidConfiguration(format!(
                "minimum validity {:?} leaves no time to acquire within expiry {:?}",
                self.min_validity, self.expiry
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = RedLockOptions::default();
        options.validate().unwrap();
        assert_eq!(options.extension_cadence, options.expiry / 3);
        assert_eq!(options.timeouts().node_request_budget(), Duration::from_secs(3));
    }

    #[test]
    fn test_with_expiry_scales_timings() {
        let options = RedLockOptions::with_expiry(Duration::from_millis(300));
        options.validate().unwrap();
        assert_eq!(options.extension_cadence, Duration::from_millis(100));
        assert_eq!(options.min_validity, Duration::from_millis(270));
    }

    #[test]
    fn test_rejects_unusable_timings() {
        let cadence_too_long = RedLockOptions {
            extension_cadence: Duration::from_secs(30),
            ..RedLockOptions::default()
        };
        assert!(matches!(
            cadence_too_long.validate(),
            Err(LockError::InvalidConfiguration(_))
        ));

        let no_budget = RedLockOptions {
            min_validity: Duration::from_secs(30),
            ..RedLockOptions::default()
        };
        assert!(no_budget.validate().is_err());
    }
}
