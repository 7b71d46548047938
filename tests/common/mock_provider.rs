//! Mock provider for testing provider abstraction.

use quorum_lock_core::context::AcquireContext;
use quorum_lock_core::error::{LockError, LockResult};
use quorum_lock_core::traits::{DistributedLock, LockHandle, LockProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Mock lock handle for testing.
pub struct MockLockHandle {
    held: Arc<Mutex<bool>>,
    lost_receiver: watch::Receiver<bool>,
}

impl LockHandle for MockLockHandle {
    fn lost_token(&self) -> &watch::Receiver<bool> {
        &self.lost_receiver
    }

    async fn release(self) -> LockResult<()> {
        *self.held.lock().unwrap() = false;
        Ok(())
    }
}

/// Mock distributed lock: one process-local flag per name.
pub struct MockDistributedLock {
    name: String,
    held: Arc<Mutex<bool>>,
}

impl MockDistributedLock {
    fn claim(&self) -> LockResult<MockLockHandle> {
        let mut held = self.held.lock().unwrap();
        if *held {
            return Err(LockError::LockFailed {
                acquired: 0,
                required: 1,
                total: 1,
            });
        }

        *held = true;
        let (_sender, receiver) = watch::channel(false);
        Ok(MockLockHandle {
            held: self.held.clone(),
            lost_receiver: receiver,
        })
    }
}

impl DistributedLock for MockDistributedLock {
    type Handle = MockLockHandle;

    fn name(&self) -> &str {
        &self.name
    }

    async fn try_acquire(&self) -> LockResult<Self::Handle> {
        self.claim()
    }

    async fn try_acquire_with(&self, ctx: &AcquireContext) -> LockResult<Self::Handle> {
        if let Some(err) = ctx.check() {
            return Err(err);
        }
        self.claim()
    }

    async fn acquire(&self, timeout: Option<Duration>) -> LockResult<Self::Handle> {
        let ctx = AcquireContext::with_timeout(timeout);
        loop {
            match self.try_acquire_with(&ctx).await {
                Err(LockError::LockFailed { .. }) => {}
                other => return other,
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                err = ctx.done() => return Err(err),
            }
        }
    }
}

/// Mock provider for testing provider abstraction.
#[derive(Default)]
pub struct MockLockProvider {
    locks: Mutex<HashMap<String, Arc<Mutex<bool>>>>,
}

impl MockLockProvider {
    /// Creates a new mock provider.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockProvider for MockLockProvider {
    type Lock = MockDistributedLock;

    fn create_lock(&self, name: &str) -> Self::Lock {
        let mut locks = self.locks.lock().unwrap();
        let held = locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(false)))
            .clone();

        MockDistributedLock {
            name: name.to_string(),
            held,
        }
    }
}
