//! RedLock extend algorithm implementation.

use std::future::Future;
use std::time::Duration;

use quorum_lock_core::error::LockResult;
use tokio::task::JoinSet;
use tracing::debug;

use super::helper::RedLockHelper;

/// Outcome of one renewal round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RedLockExtendResult {
    /// Nodes whose TTL was reset.
    pub extended: usize,
    /// Nodes that no longer held our token.
    pub not_owned: usize,
    /// Nodes that errored, timed out or whose task panicked.
    pub faulted: usize,
}

impl RedLockExtendResult {
    /// Whether the extended nodes still form a quorum of `database_count`.
    pub fn holds_quorum(&self, database_count: usize) -> bool {
        RedLockHelper::has_sufficient_successes(self.extended, database_count)
    }
}

/// Extends a lock on every node marked in `targets`.
///
/// Each node is renewed independently and concurrently; a failure on one
/// node does not affect the others. Dropping the returned future aborts
/// the outstanding requests.
///
/// # Arguments
///
/// * `try_extend_fn` - Extends the lease on a single node
/// * `nodes` - All configured nodes
/// * `targets` - Acquire results indexed like `nodes`
/// * `budget` - Upper bound for each node request
pub async fn extend_redlock<N, F, Fut>(
    try_extend_fn: F,
    nodes: &[N],
    targets: &[bool],
    budget: Duration,
) -> RedLockExtendResult
where
    N: Clone + Send + 'static,
    F: Fn(N) -> Fut,
    Fut: Future<Output = LockResult<bool>> + Send + 'static,
{
    let mut extend_tasks = JoinSet::new();
    for (idx, (node, _)) in nodes
        .iter()
        .zip(targets)
        .enumerate()
        .filter(|(_, (_, target))| **target)
    {
        let request = try_extend_fn(node.clone());
        extend_tasks
            .spawn(async move { (idx, RedLockHelper::within_budget(budget, request).await) });
    }

    let mut result = RedLockExtendResult::default();
    while let Some(joined) = extend_tasks.join_next().await {
        match joined {
            Ok((_, Ok(true))) => result.extended += 1,
            Ok((idx, Ok(false))) => {
                debug!(node = idx, "extend skipped: token no longer owned");
                result.not_owned += 1;
            }
            Ok((idx, Err(e))) => {
                debug!(node = idx, error = %e, "extend failed");
                result.faulted += 1;
            }
            Err(e) => {
                debug!(error = %e, "extend task did not complete");
                result.faulted += 1;
            }
        }
    }
    result
}
