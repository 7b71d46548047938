//! RedLock release algorithm implementation.

use std::future::Future;
use std::time::Duration;

use quorum_lock_core::error::{LockError, LockResult};
use tokio::task::JoinHandle;
use tracing::debug;

use super::helper::RedLockHelper;

/// Outcome of releasing a lease on a set of nodes.
#[derive(Debug, Default)]
pub struct RedLockReleaseSummary {
    /// Nodes where our token was found and deleted.
    pub released: usize,
    /// Nodes that no longer held our token (expired or re-acquired).
    pub not_owned: usize,
    /// Nodes that errored, timed out or whose task panicked.
    pub faulted: usize,
    /// First error reported by a faulted node.
    pub first_error: Option<LockError>,
}

impl RedLockReleaseSummary {
    /// Number of nodes a release was dispatched to.
    pub fn total(&self) -> usize {
        self.released + self.not_owned + self.faulted
    }
}

/// Release requests that have been dispatched but not awaited.
///
/// Dropping the batch detaches the requests: they keep running on the
/// runtime and their outcome is discarded.
#[derive(Debug)]
pub struct RedLockReleaseBatch {
    tasks: Vec<(usize, JoinHandle<LockResult<bool>>)>,
}

impl RedLockReleaseBatch {
    /// Indexes of the nodes a release was sent to.
    pub fn node_indices(&self) -> Vec<usize> {
        self.tasks.iter().map(|(idx, _)| *idx).collect()
    }

    /// Whether no node needed a release.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every dispatched release to finish.
    pub async fn wait(self) -> RedLockReleaseSummary {
        let mut summary = RedLockReleaseSummary::default();
        for (idx, task) in self.tasks {
            match task.await {
                Ok(Ok(true)) => summary.released += 1,
                Ok(Ok(false)) => {
                    debug!(node = idx, "release skipped: token no longer owned");
                    summary.not_owned += 1;
                }
                Ok(Err(e)) => {
                    debug!(node = idx, error = %e, "release failed");
                    summary.faulted += 1;
                    summary.first_error.get_or_insert(e);
                }
                Err(e) => {
                    debug!(node = idx, error = %e, "release task did not complete");
                    summary.faulted += 1;
                }
            }
        }
        summary
    }
}

/// Sends a release to every node marked in `targets` without waiting.
///
/// `targets` is indexed like `nodes`. Each request runs as its own task
/// and is bounded by `budget`.
pub fn dispatch_release<N, F, Fut>(
    try_release_fn: F,
    nodes: &[N],
    targets: &[bool],
    budget: Duration,
) -> RedLockReleaseBatch
where
    N: Clone + Send + 'static,
    F: Fn(N) -> Fut,
    Fut: Future<Output = LockResult<bool>> + Send + 'static,
{
    let tasks = nodes
        .iter()
        .zip(targets)
        .enumerate()
        .filter(|(_, (_, target))| **target)
        .map(|(idx, (node, _))| {
            let request = try_release_fn(node.clone());
            let task = tokio::spawn(RedLockHelper::within_budget(budget, request));
            (idx, task)
        })
        .collect();

    RedLockReleaseBatch { tasks }
}

/// Releases a lock on every targeted node and waits for the outcome.
///
/// Individual failures are tolerated; an error is returned only when a
/// majority of the targeted nodes faulted.
pub async fn release_redlock<N, F, Fut>(
    try_release_fn: F,
    nodes: &[N],
    targets: &[bool],
    budget: Duration,
) -> LockResult<RedLockReleaseSummary>
where
    N: Clone + Send + 'static,
    F: Fn(N) -> Fut,
    Fut: Future<Output = LockResult<bool>> + Send + 'static,
{
    let mut summary = dispatch_release(try_release_fn, nodes, targets, budget)
        .wait()
        .await;

    let total = summary.total();
    if total > 0 && RedLockHelper::has_too_many_failures_or_faults(summary.faulted, total) {
        return Err(summary.first_error.take().unwrap_or_else(|| {
            LockError::Backend(Box::new(std::io::Error::other(
                "failed to release lock on majority of servers",
            )))
        }));
    }

    Ok(summary)
}
