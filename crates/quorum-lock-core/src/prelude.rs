//! Convenience prelude for distributed lock types.

pub use crate::context::AcquireContext;
pub use crate::error::{LockError, LockResult};
pub use crate::traits::{DistributedLock, LockHandle, LockProvider, LockProviderExt};
