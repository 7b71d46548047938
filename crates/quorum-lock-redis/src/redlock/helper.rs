//! RedLock helper functions.

use std::future::Future;
use std::time::Duration;

use quorum_lock_core::error::{LockError, LockResult};
use uuid::Uuid;

/// Helper functions for RedLock algorithm.
pub struct RedLockHelper;

impl RedLockHelper {
    /// Number of nodes that make a strict majority of `database_count`.
    pub fn quorum(database_count: usize) -> usize {
        (database_count / 2) + 1
    }

    /// Checks if we have sufficient successes for majority consensus.
    ///
    /// For N servers, we need at least (N/2 + 1) successes. With an even N,
    /// exactly N/2 is not enough.
    pub fn has_sufficient_successes(success_count: usize, database_count: usize) -> bool {
        database_count > 0 && success_count >= Self::quorum(database_count)
    }

    /// Checks if we have too many failures/faults to achieve majority.
    ///
    /// For odd N: (N+1)/2 failures rule out majority.
    /// For even N: N/2 failures rule out majority.
    pub fn has_too_many_failures_or_faults(
        failure_or_fault_count: usize,
        database_count: usize,
    ) -> bool {
        let threshold = (database_count / 2) + (database_count % 2);
        failure_or_fault_count >= threshold
    }

    /// Mints a fencing token for one acquisition attempt.
    pub fn create_lock_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Runs a single node request, failing it once `budget` is spent.
    pub async fn within_budget<T, Fut>(budget: Duration, request: Fut) -> LockResult<T>
    where
        Fut: Future<Output = LockResult<T>>,
    {
        tokio::time::timeout(budget, request)
            .await
            .unwrap_or(Err(LockError::Timeout(budget)))
    }
}
