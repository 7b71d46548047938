//! Redis distributed lock implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fred::prelude::RedisClient;
use quorum_lock_core::context::AcquireContext;
use quorum_lock_core::error::{LockError, LockResult};
use quorum_lock_core::traits::DistributedLock;
use tokio::time::Instant;
use tracing::{Span, field, instrument};

use crate::handle::RedisLockHandle;
use crate::node::LockNode;
use crate::options::RedLockOptions;
use crate::redlock::{RedLockHelper, RedLockTimeouts, acquire::acquire_redlock};

/// State of one acquisition attempt: the key and the fencing token minted
/// for it.
#[derive(Debug, Clone)]
pub struct RedisLockState {
    /// Redis key for the lock.
    pub key: String,
    /// Fencing token, unique to this attempt.
    pub lock_id: String,
    /// Timeout configuration.
    pub timeouts: RedLockTimeouts,
}

impl RedisLockState {
    /// Creates a new lock state with a fresh fencing token.
    pub fn new(key: String, timeouts: RedLockTimeouts) -> Self {
        Self {
            key,
            lock_id: RedLockHelper::create_lock_id(),
            timeouts,
        }
    }

    /// Attempts to acquire the lock on a single node.
    pub async fn try_acquire<N: LockNode>(&self, node: &N) -> LockResult<bool> {
        node.set_if_absent(&self.key, &self.lock_id, self.timeouts.expiry)
            .await
    }

    /// Resets the lease TTL on a single node if it still holds our token.
    pub async fn try_extend<N: LockNode>(&self, node: &N) -> LockResult<bool> {
        node.extend_if_owned(&self.key, &self.lock_id, self.timeouts.expiry)
            .await
    }

    /// Deletes the key on a single node if it still holds our token.
    pub async fn try_release<N: LockNode>(&self, node: &N) -> LockResult<bool> {
        node.delete_if_owned(&self.key, &self.lock_id).await
    }
}

/// Marks a lock instance as having a live handle.
///
/// Cleared when dropped, so an abandoned acquisition or a dropped handle
/// frees the instance.
#[derive(Debug)]
pub(crate) struct HeldFlag(Arc<AtomicBool>);

impl HeldFlag {
    fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for HeldFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A Redis-based distributed lock.
///
/// The lock is spread over every configured node; it is held while a
/// strict majority of them store this holder's fencing token. With a
/// single node this degenerates to a plain `SET NX` lock.
///
/// A lock instance hands out at most one live handle at a time. Separate
/// instances for the same name (e.g. from repeated
/// [`create_lock`](quorum_lock_core::LockProvider::create_lock) calls)
/// compete through the nodes like separate processes would.
pub struct RedisDistributedLock<N: LockNode = RedisClient> {
    name: String,
    key: String,
    nodes: Arc<[N]>,
    options: Arc<RedLockOptions>,
    held: Arc<AtomicBool>,
}

impl<N: LockNode> RedisDistributedLock<N> {
    /// Creates a lock named `name` over `nodes`.
    ///
    /// The node list is fixed for the lifetime of the lock.
    pub fn new(name: impl Into<String>, nodes: Arc<[N]>, options: Arc<RedLockOptions>) -> Self {
        let name = name.into();
        let key = format!("{}{}", options.key_prefix, name);
        Self {
            name,
            key,
            nodes,
            options,
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Gets the lock name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key stored on every node.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of nodes the lock is spread over.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether this instance currently has a live handle.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Retries single attempts every `try_lock_interval` until one succeeds,
    /// one fails with a non-retryable error, or `ctx` resolves.
    pub async fn acquire_with(&self, ctx: &AcquireContext) -> LockResult<RedisLockHandle<N>> {
        loop {
            match self.try_acquire_with(ctx).await {
                Err(e) if e.is_retryable() => {}
                other => return other,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.try_lock_interval) => {}
                err = ctx.done() => return Err(err),
            }
        }
    }
}

impl<N: LockNode> DistributedLock for RedisDistributedLock<N> {
    type Handle = RedisLockHandle<N>;

    fn name(&self) -> &str {
        self.name()
    }

    async fn try_acquire(&self) -> LockResult<Self::Handle> {
        self.try_acquire_with(&AcquireContext::background()).await
    }

    #[instrument(
        skip(self, ctx),
        fields(
            lock.name = %self.name,
            lock.key = %self.key,
            backend = "redis",
            servers = self.nodes.len(),
            acquired = field::Empty,
            servers_acquired = field::Empty,
            elapsed_ms = field::Empty,
        )
    )]
    async fn try_acquire_with(&self, ctx: &AcquireContext) -> LockResult<Self::Handle> {
        let held = HeldFlag::claim(&self.held)
            .ok_or_else(|| LockError::AlreadyLocked(self.name.clone()))?;

        let start = Instant::now();
        let timeouts = self.options.timeouts();
        let state = Arc::new(RedisLockState::new(self.key.clone(), timeouts.clone()));

        let acquire_state = state.clone();
        let release_state = state.clone();
        let result = acquire_redlock(
            move |node: N| {
                let state = acquire_state.clone();
                async move { state.try_acquire(&node).await }
            },
            move |node: N| {
                let state = release_state.clone();
                async move { state.try_release(&node).await }
            },
            &self.nodes[..],
            &timeouts,
            ctx,
        )
        .await;

        let span = Span::current();
        span.record("elapsed_ms", start.elapsed().as_millis() as u64);
        match result {
            Ok(acquired) => {
                span.record("acquired", true);
                span.record("servers_acquired", acquired.success_count());
                Ok(RedisLockHandle::new(
                    state,
                    self.nodes.clone(),
                    acquired.acquire_results,
                    self.options.extension_cadence,
                    held,
                ))
            }
            Err(e) => {
                span.record("acquired", false);
                Err(e)
            }
        }
    }

    async fn acquire(&self, timeout: Option<Duration>) -> LockResult<Self::Handle> {
        self.acquire_with(&AcquireContext::with_timeout(timeout))
            .await
    }
}
