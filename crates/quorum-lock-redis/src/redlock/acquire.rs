//! RedLock acquire algorithm implementation.

use std::future::Future;

use quorum_lock_core::context::AcquireContext;
use quorum_lock_core::error::{LockError, LockResult};
use tokio::task::JoinSet;
use tracing::debug;

use super::helper::RedLockHelper;
use super::release::dispatch_release;
use super::timeouts::RedLockTimeouts;

/// Result of a RedLock acquire operation.
#[derive(Debug, Clone)]
pub struct RedLockAcquireResult {
    /// Results indexed by client position (true = success, false = failed).
    pub acquire_results: Vec<bool>,
}

impl RedLockAcquireResult {
    /// Creates a new acquire result.
    pub fn new(acquire_results: Vec<bool>) -> Self {
        Self { acquire_results }
    }

    /// Checks if the acquire was successful (majority consensus).
    pub fn is_successful(&self, total_clients: usize) -> bool {
        RedLockHelper::has_sufficient_successes(self.success_count(), total_clients)
    }

    /// Returns the number of successful acquisitions.
    pub fn success_count(&self) -> usize {
        self.acquire_results.iter().filter(|&&v| v).count()
    }

    /// Indexes of the nodes that accepted the key, in node order.
    pub fn acquired_nodes(&self) -> Vec<usize> {
        self.acquire_results
            .iter()
            .enumerate()
            .filter_map(|(idx, &acquired)| acquired.then_some(idx))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeOutcome {
    /// No answer yet, or the attempt was aborted or panicked.
    Pending,
    Acquired,
    /// The node answered that someone else holds the key.
    Rejected,
    Faulted,
}

impl NodeOutcome {
    /// Whether the key may be sitting on the node with our token.
    fn needs_compensation(self) -> bool {
        self != Self::Rejected
    }
}

/// Acquires a lock using the RedLock algorithm across multiple Redis servers.
///
/// Every node gets one set-if-absent attempt, all running concurrently.
/// Once every attempt has finished, the lock is held iff strictly more
/// than half of the configured nodes accepted it. Otherwise every node
/// that may hold our token is sent a compare-and-delete, and the call
/// fails with [`LockError::LockFailed`]. Errors from individual nodes only
/// count as "not acquired there".
///
/// If `ctx` resolves first, or the returned future is dropped before it
/// completes, the outstanding attempts are aborted and a release is
/// dispatched (without waiting) to every node that did not reject the key.
/// The context's error is returned in the first case.
///
/// # Arguments
///
/// * `try_acquire_fn` - Attempts to acquire the lock on a single node
/// * `try_release_fn` - Compare-and-delete used for compensation
/// * `nodes` - Configured nodes; order defines the result indexes
/// * `timeouts` - Timeout configuration, bounds each node request
/// * `ctx` - Caller deadline and cancellation
pub async fn acquire_redlock<N, A, AFut, R, RFut>(
    try_acquire_fn: A,
    try_release_fn: R,
    nodes: &[N],
    timeouts: &RedLockTimeouts,
    ctx: &AcquireContext,
) -> LockResult<RedLockAcquireResult>
where
    N: Clone + Send + 'static,
    A: Fn(N) -> AFut,
    AFut: Future<Output = LockResult<bool>> + Send + 'static,
    R: Fn(N) -> RFut,
    RFut: Future<Output = LockResult<bool>> + Send + 'static,
{
    if nodes.is_empty() {
        return Err(LockError::InvalidConfiguration(
            "no lock nodes configured".to_string(),
        ));
    }

    if let Some(err) = ctx.check() {
        return Err(err);
    }

    let total = nodes.len();
    let budget = timeouts.node_request_budget();

    // Runs if this future is dropped or the context fires before the
    // outcome is known.
    let mut cleanup = Compensation::new(total, |targets: &[bool]| {
        // Dropped outside a runtime (e.g. at shutdown): nothing to spawn on.
        if tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        let batch = dispatch_release(&try_release_fn, nodes, targets, budget);
        if !batch.is_empty() {
            debug!(nodes = ?batch.node_indices(), "acquire abandoned, cleanup dispatched");
        }
    });

    // Start acquire attempts on all nodes in parallel
    let mut acquire_tasks = JoinSet::new();
    for (idx, node) in nodes.iter().enumerate() {
        let request = try_acquire_fn(node.clone());
        acquire_tasks
            .spawn(async move { (idx, RedLockHelper::within_budget(budget, request).await) });
    }

    loop {
        tokio::select! {
            joined = acquire_tasks.join_next() => {
                let Some(joined) = joined else { break };
                match joined {
                    Ok((idx, Ok(true))) => cleanup.outcomes[idx] = NodeOutcome::Acquired,
                    Ok((idx, Ok(false))) => cleanup.outcomes[idx] = NodeOutcome::Rejected,
                    Ok((idx, Err(e))) => {
                        debug!(node = idx, error = %e, "acquire attempt failed");
                        cleanup.outcomes[idx] = NodeOutcome::Faulted;
                    }
                    // Panicked task: its node stays Pending.
                    Err(e) => debug!(error = %e, "acquire task did not complete"),
                }
            }
            err = ctx.done() => {
                acquire_tasks.abort_all();
                return Err(err);
            }
        }
    }

    let result = RedLockAcquireResult::new(
        cleanup
            .outcomes
            .iter()
            .map(|&outcome| outcome == NodeOutcome::Acquired)
            .collect(),
    );
    let targets = cleanup.disarm();
    if result.is_successful(total) {
        return Ok(result);
    }

    let released = dispatch_release(&try_release_fn, nodes, &targets, budget)
        .wait()
        .await;
    debug!(
        released = released.released,
        faulted = released.faulted,
        "released partial acquisition"
    );

    Err(LockError::LockFailed {
        acquired: result.success_count(),
        required: RedLockHelper::quorum(total),
        total,
    })
}

/// Per-node outcomes of an acquisition still in progress.
///
/// Dropped while armed, it hands every node that may hold the token to
/// `on_abandon`.
struct Compensation<F: FnOnce(&[bool])> {
    outcomes: Vec<NodeOutcome>,
    on_abandon: Option<F>,
}

impl<F: FnOnce(&[bool])> Compensation<F> {
    fn new(total: usize, on_abandon: F) -> Self {
        Self {
            outcomes: vec![NodeOutcome::Pending; total],
            on_abandon: Some(on_abandon),
        }
    }

    /// Takes the cleanup over from the guard and returns its targets.
    fn disarm(&mut self) -> Vec<bool> {
        self.on_abandon = None;
        compensation_targets(&self.outcomes)
    }
}

impl<F: FnOnce(&[bool])> Drop for Compensation<F> {
    fn drop(&mut self) {
        if let Some(on_abandon) = self.on_abandon.take() {
            on_abandon(&compensation_targets(&self.outcomes));
        }
    }
}

fn compensation_targets(outcomes: &[NodeOutcome]) -> Vec<bool> {
    outcomes
        .iter()
        .map(|outcome| outcome.needs_compensation())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted node: index into a table of answers.
    #[derive(Clone)]
    struct Scripted {
        answer: Option<bool>,
        released: Arc<AtomicUsize>,
    }

    fn scripted(answers: &[Option<bool>]) -> (Vec<Scripted>, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let nodes = answers
            .iter()
            .map(|&answer| Scripted {
                answer,
                released: released.clone(),
            })
            .collect();
        (nodes, released)
    }

    async fn run(nodes: &[Scripted]) -> LockResult<RedLockAcquireResult> {
        let timeouts = RedLockTimeouts::new(Duration::from_secs(30), Duration::from_secs(27));
        acquire_redlock(
            |node: Scripted| async move {
                node.answer.ok_or_else(|| {
                    LockError::Connection(Box::new(std::io::Error::other("node down")))
                })
            },
            |node: Scripted| async move {
                node.released.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            },
            nodes,
            &timeouts,
            &AcquireContext::background(),
        )
        .await
    }

    #[tokio::test]
    async fn test_majority_acquires() {
        let (nodes, released) = scripted(&[Some(true), None, Some(true)]);
        let result = run(&nodes).await.unwrap();
        assert_eq!(result.acquired_nodes(), vec![0, 2]);
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_minority_compensates_accepted_and_faulted_nodes() {
        let (nodes, released) = scripted(&[Some(true), None, Some(false)]);
        let err = run(&nodes).await.unwrap_err();
        assert!(matches!(
            err,
            LockError::LockFailed {
                acquired: 1,
                required: 2,
                total: 3
            }
        ));
        // Node 0 accepted, node 1 faulted; node 2 rejected and is left alone.
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_even_split_fails() {
        let (nodes, _) = scripted(&[Some(true), Some(true), Some(false), Some(false)]);
        assert!(matches!(
            run(&nodes).await,
            Err(LockError::LockFailed { acquired: 2, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_attempt_releases_every_node_not_rejected() {
        // `None` here means the node never answers.
        let (nodes, released) = scripted(&[Some(true), Some(true), Some(false), None]);
        let timeouts = RedLockTimeouts::new(Duration::from_secs(30), Duration::from_secs(27));
        let ctx = AcquireContext::background();
        let attempt = acquire_redlock(
            |node: Scripted| async move {
                match node.answer {
                    Some(answer) => Ok(answer),
                    None => std::future::pending::<LockResult<bool>>().await,
                }
            },
            |node: Scripted| async move {
                node.released.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            },
            &nodes,
            &timeouts,
            &ctx,
        );

        assert!(
            tokio::time::timeout(Duration::from_millis(10), attempt)
                .await
                .is_err()
        );
        tokio::time::sleep(Duration::from_millis(1)).await;

        // Nodes 0 and 1 accepted and node 3 was still in flight.
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_nodes_is_a_configuration_error() {
        let (nodes, _) = scripted(&[]);
        assert!(matches!(
            run(&nodes).await,
            Err(LockError::InvalidConfiguration(_))
        ));
    }
}
