//! Error types for distributed lock operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// Quorum was not reached; the caller may retry after a backoff.
    #[error("lock not acquired: {acquired} of {total} nodes accepted, {required} required")]
    LockFailed {
        /// Nodes that accepted the key.
        acquired: usize,
        /// Strict majority of `total`.
        required: usize,
        /// Configured node count.
        total: usize,
    },

    /// The acquisition deadline elapsed before quorum could be determined.
    #[error("lock acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// Lock operation was cancelled.
    #[error("lock operation was cancelled")]
    Cancelled,

    /// The lock instance already has a live handle.
    #[error("lock is already held by this instance: {0}")]
    AlreadyLocked(String),

    /// The lock or provider was configured in a way that can never succeed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Backend connection failed.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    /// Returns `true` for failures the caller can retry after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockFailed { .. } | Self::Timeout(_))
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
