//! Deadline and cancellation propagation for acquisition attempts.
//!
//! An [`AcquireContext`] plays the role a request context plays in other
//! ecosystems: it travels with an acquisition attempt and tells the backend
//! when the caller has stopped waiting, so outstanding node requests can be
//! abandoned and any partial state cleaned up.

use std::future::pending;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

use crate::error::LockError;
use crate::timeout::TimeoutValue;

/// Deadline and cancel signal for a single acquisition.
///
/// # Example
///
/// ```rust,ignore
/// let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
/// let ctx = AcquireContext::with_timeout(Duration::from_secs(2)).cancel_on(cancel_rx);
///
/// // Elsewhere: cancel_tx.send(true) aborts the attempt with `LockError::Cancelled`.
/// let handle = lock.try_acquire_with(&ctx).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct AcquireContext {
    deadline: Option<Deadline>,
    cancel: Option<watch::Receiver<bool>>,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

impl AcquireContext {
    /// A context that never expires and cannot be cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now. `None` never expires.
    pub fn with_timeout(timeout: impl Into<TimeoutValue>) -> Self {
        let timeout = timeout.into();
        let deadline = timeout
            .as_duration()
            .zip(timeout.deadline_from(Instant::now()))
            .map(|(budget, at)| Deadline { at, budget });
        Self {
            deadline,
            cancel: None,
        }
    }

    /// Cancels the context once `cancel` observes `true`.
    pub fn cancel_on(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The total budget this context was created with.
    pub fn timeout(&self) -> Option<Duration> {
        self.deadline.map(|d| d.budget)
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.at.saturating_duration_since(Instant::now()))
    }

    /// Returns the error this context has already resolved to, if any.
    pub fn check(&self) -> Option<LockError> {
        if self.is_cancelled() {
            return Some(LockError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d.at => Some(LockError::Timeout(d.budget)),
            _ => None,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the context is cancelled or its deadline passes.
    ///
    /// Cancel-safe: it can be polled in a `select!` loop and recreated on
    /// every iteration.
    pub async fn done(&self) -> LockError {
        let cancelled = async {
            match self.cancel.clone() {
                Some(mut rx) => loop {
                    if *rx.borrow_and_update() {
                        break;
                    }
                    if rx.changed().await.is_err() {
                        // Sender gone: nobody can cancel any more.
                        pending::<()>().await;
                    }
                },
                None => pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(d) => {
                    sleep_until(d.at).await;
                    d.budget
                }
                None => pending::<Duration>().await,
            }
        };

        tokio::select! {
            _ = cancelled => LockError::Cancelled,
            budget = expired => LockError::Timeout(budget),
        }
    }
}
