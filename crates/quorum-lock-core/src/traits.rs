//! Core traits for distributed locks.

use std::future::Future;
use std::time::Duration;

use crate::context::AcquireContext;
use crate::error::LockResult;

// ============================================================================
// Lock Handle Trait
// ============================================================================

/// Handle to a held distributed lock.
///
/// Dropping this handle stops lease renewal; the lock then lapses once its
/// TTL runs out. Call `release()` to free it immediately.
///
/// # Example
///
/// ```rust,ignore
/// let handle = lock.try_acquire().await?;
/// // Critical section - we hold the lock
/// do_work().await;
/// handle.release().await?;
/// ```
pub trait LockHandle: Send + Sync + Sized {
    /// Returns a receiver that signals when the lock is believed lost.
    ///
    /// The receiver yields `true` once the backend can no longer show that
    /// the lease is held on a quorum of nodes. The signal is advisory: a
    /// holder that silently lost quorum between renewals is only bounded by
    /// the lease TTL.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut lost = handle.lost_token().clone();
    /// tokio::select! {
    ///     _ = lost.wait_for(|lost| *lost) => {
    ///         eprintln!("Lock was lost!");
    ///     }
    ///     _ = do_work() => {
    ///         // Work completed while still holding lock
    ///     }
    /// }
    /// ```
    fn lost_token(&self) -> &tokio::sync::watch::Receiver<bool>;

    /// Releases the lock.
    ///
    /// Stops renewal and dispatches the release to every node holding the
    /// lease without waiting for the nodes to answer.
    fn release(self) -> impl Future<Output = LockResult<()>> + Send;
}

// ============================================================================
// Distributed Lock Trait
// ============================================================================

/// A distributed mutual exclusion lock.
///
/// Provides exclusive access to a resource identified by `name` across
/// processes and machines.
///
/// `try_acquire` makes exactly one attempt. Retrying is the caller's
/// decision; `acquire` is the stock retry loop for callers that want one.
pub trait DistributedLock: Send + Sync {
    /// The handle type returned when the lock is acquired.
    type Handle: LockHandle + Send;

    /// Returns the unique name identifying this lock.
    fn name(&self) -> &str;

    /// Makes a single acquisition attempt with no deadline.
    ///
    /// # Returns
    ///
    /// * `Ok(handle)` - Lock acquired
    /// * `Err(LockError::LockFailed { .. })` - Quorum not reached
    /// * `Err(LockError::AlreadyLocked(_))` - This instance already holds the lock
    fn try_acquire(&self) -> impl Future<Output = LockResult<Self::Handle>> + Send;

    /// Makes a single acquisition attempt bounded by `ctx`.
    ///
    /// Returns `LockError::Timeout` or `LockError::Cancelled` when `ctx`
    /// resolves before quorum could be determined.
    fn try_acquire_with(
        &self,
        ctx: &AcquireContext,
    ) -> impl Future<Output = LockResult<Self::Handle>> + Send;

    /// Retries `try_acquire` at the backend's retry interval until it
    /// succeeds or `timeout` elapses. `None` means wait indefinitely.
    fn acquire(
        &self,
        timeout: Option<Duration>,
    ) -> impl Future<Output = LockResult<Self::Handle>> + Send;
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Factory for creating distributed locks by name.
///
/// Providers own the backend clients, so application code can create
/// locks anywhere without touching connection details.
///
/// # Example
///
/// ```rust,ignore
/// // Configure once at startup
/// let provider = RedisLockProvider::builder()
///     .urls(&["redis://a:6379", "redis://b:6379", "redis://c:6379"])
///     .build()
///     .await?;
///
/// // Create locks by name anywhere in the application
/// let lock = provider.create_lock("my-resource");
/// let handle = lock.try_acquire().await?;
/// ```
pub trait LockProvider: Send + Sync {
    /// The lock type created by this provider.
    type Lock: DistributedLock;

    /// Creates a lock with the given name.
    fn create_lock(&self, name: &str) -> Self::Lock;
}

// ============================================================================
// Convenience Extensions
// ============================================================================

/// Extension trait providing convenience methods for lock providers.
pub trait LockProviderExt: LockProvider {
    /// Acquires a lock by name, retrying until `timeout` elapses.
    fn acquire_lock(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> impl Future<Output = LockResult<<Self::Lock as DistributedLock>::Handle>> + Send
    where
        Self: Sync,
    {
        async move {
            let lock = self.create_lock(name);
            lock.acquire(timeout).await
        }
    }

    /// Makes a single acquisition attempt on a lock by name.
    fn try_acquire_lock(
        &self,
        name: &str,
    ) -> impl Future<Output = LockResult<<Self::Lock as DistributedLock>::Handle>> + Send
    where
        Self: Sync,
    {
        async move {
            let lock = self.create_lock(name);
            lock.try_acquire().await
        }
    }
}

// Blanket implementation for all LockProviders
impl<T: LockProvider> LockProviderExt for T {}
