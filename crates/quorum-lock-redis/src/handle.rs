//! Redis lock handle implementation.

use std::sync::Arc;
use std::time::Duration;

use fred::prelude::RedisClient;
use quorum_lock_core::error::LockResult;
use quorum_lock_core::traits::LockHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, instrument, warn};

use crate::lock::{HeldFlag, RedisLockState};
use crate::node::LockNode;
use crate::redlock::{
    RedLockReleaseBatch, RedLockReleaseSummary, dispatch_release, extend_redlock,
    release_redlock,
};

/// Handle for a held Redis lock.
///
/// The lease is extended in the background while this handle exists.
/// Dropping the handle stops the renewal and leaves the keys to expire;
/// `release` deletes them right away.
pub struct RedisLockHandle<N: LockNode = RedisClient> {
    /// Lock state.
    state: Arc<RedisLockState>,
    /// All configured nodes.
    nodes: Arc<[N]>,
    /// Acquire results indexed by node position.
    acquire_results: Arc<Vec<bool>>,
    /// Watch channel for lock lost detection.
    lost_receiver: watch::Receiver<bool>,
    /// Tells the renewal task to exit; dropping it has the same effect.
    stop_sender: watch::Sender<bool>,
    /// Background extension task handle.
    extension_task: Option<JoinHandle<()>>,
    _held: HeldFlag,
}

impl<N: LockNode> RedisLockHandle<N> {
    /// Creates a new lock handle and starts renewing the lease.
    pub(crate) fn new(
        state: Arc<RedisLockState>,
        nodes: Arc<[N]>,
        acquire_results: Vec<bool>,
        extension_cadence: Duration,
        held: HeldFlag,
    ) -> Self {
        let acquire_results = Arc::new(acquire_results);
        let (lost_sender, lost_receiver) = watch::channel(false);
        let (stop_sender, stop_receiver) = watch::channel(false);

        let extension_task = tokio::spawn(renew_until_stopped(
            state.clone(),
            nodes.clone(),
            acquire_results.clone(),
            extension_cadence,
            stop_receiver,
            lost_sender,
        ));

        Self {
            state,
            nodes,
            acquire_results,
            lost_receiver,
            stop_sender,
            extension_task: Some(extension_task),
            _held: held,
        }
    }

    /// The key stored on the nodes.
    pub fn resource_key(&self) -> &str {
        &self.state.key
    }

    /// The fencing token set on the nodes for this acquisition.
    pub fn fencing_token(&self) -> &str {
        &self.state.lock_id
    }

    /// Indexes of the nodes holding the lease, in configuration order.
    pub fn acquired_nodes(&self) -> Vec<usize> {
        self.acquire_results
            .iter()
            .enumerate()
            .filter_map(|(idx, &acquired)| acquired.then_some(idx))
            .collect()
    }

    /// Whether the background renewal task is still running.
    pub fn is_renewing(&self) -> bool {
        self.extension_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn stop_renewal(&self) {
        self.stop_sender.send_replace(true);
    }

    fn send_release(&self) -> RedLockReleaseBatch {
        let state = self.state.clone();
        dispatch_release(
            move |node: N| {
                let state = state.clone();
                async move { state.try_release(&node).await }
            },
            &self.nodes[..],
            &self.acquire_results,
            self.state.timeouts.node_request_budget(),
        )
    }

    /// Releases the lock and waits until renewal has stopped and every
    /// node has answered.
    ///
    /// Fails only when a majority of the acquired nodes could not be
    /// reached; the summary reports per-node outcomes otherwise.
    pub async fn release_and_wait(mut self) -> LockResult<RedLockReleaseSummary> {
        self.stop_renewal();
        if let Some(task) = self.extension_task.take()
            && let Err(e) = task.await
        {
            warn!(key = %self.state.key, error = %e, "renewal task ended abnormally");
        }

        let state = self.state.clone();
        let summary = release_redlock(
            move |node: N| {
                let state = state.clone();
                async move { state.try_release(&node).await }
            },
            &self.nodes[..],
            &self.acquire_results,
            self.state.timeouts.node_request_budget(),
        )
        .await;
        debug!(key = %self.state.key, "release completed");
        summary
    }
}

impl<N: LockNode> LockHandle for RedisLockHandle<N> {
    fn lost_token(&self) -> &watch::Receiver<bool> {
        &self.lost_receiver
    }

    #[instrument(skip(self), fields(lock.key = %self.state.key, backend = "redis"))]
    async fn release(self) -> LockResult<()> {
        self.stop_renewal();
        // Detached: the deletes finish on their own.
        let batch = self.send_release();
        debug!(nodes = ?batch.node_indices(), "release dispatched");
        Ok(())
    }
}

/// Resets the lease TTL on every acquired node each `cadence` until
/// `stop` fires or its sender is dropped.
///
/// A node that fails to renew is not fatal. When a round extends fewer
/// than a quorum of the configured nodes, the lost signal is raised but
/// renewal carries on.
async fn renew_until_stopped<N: LockNode>(
    state: Arc<RedisLockState>,
    nodes: Arc<[N]>,
    acquire_results: Arc<Vec<bool>>,
    cadence: Duration,
    mut stop: watch::Receiver<bool>,
    lost_sender: watch::Sender<bool>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + cadence, cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let budget = state.timeouts.node_request_budget();

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {}
        }

        let extend_state = state.clone();
        let round = extend_redlock(
            move |node: N| {
                let state = extend_state.clone();
                async move { state.try_extend(&node).await }
            },
            &nodes[..],
            &acquire_results,
            budget,
        );
        let result = tokio::select! {
            _ = stop.changed() => break,
            result = round => result,
        };

        if result.holds_quorum(nodes.len()) {
            debug!(key = %state.key, extended = result.extended, "lease extended");
        } else {
            warn!(
                key = %state.key,
                extended = result.extended,
                not_owned = result.not_owned,
                faulted = result.faulted,
                "lease extended on fewer than a quorum of nodes"
            );
            lost_sender.send_if_modified(|lost| !std::mem::replace(lost, true));
        }
    }

    debug!(key = %state.key, "renewal stopped");
}
