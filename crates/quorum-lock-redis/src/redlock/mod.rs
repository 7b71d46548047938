//! RedLock algorithm implementation for distributed locking across multiple Redis servers.
//!
//! See https://redis.io/topics/distlock for the algorithm specification.
//!
//! Each phase fans out one task per node and folds per-node errors into
//! the aggregate outcome, so a minority of unreachable nodes never aborts
//! an operation. A holder that loses quorum after acquiring is not told
//! synchronously; the lease TTL bounds how long it can wrongly believe it
//! still owns the lock.

pub mod acquire;
pub mod extend;
pub mod helper;
pub mod release;
pub mod timeouts;

pub use acquire::{RedLockAcquireResult, acquire_redlock};
pub use extend::{RedLockExtendResult, extend_redlock};
pub use helper::RedLockHelper;
pub use release::{RedLockReleaseBatch, RedLockReleaseSummary, dispatch_release, release_redlock};
pub use timeouts::RedLockTimeouts;
