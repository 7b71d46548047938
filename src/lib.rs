//! Quorum-based distributed locks for Rust.
//!
//! A lock is spread across several independent Redis servers and is held
//! while a strict majority of them store the holder's fencing token
//! (the RedLock algorithm). The lease is renewed in the background while
//! held and released with an atomic compare-and-delete.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use quorum_lock::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = RedisLockProvider::builder()
//!         .urls(&[
//!             "redis://redis-a:6379",
//!             "redis://redis-b:6379",
//!             "redis://redis-c:6379",
//!         ])
//!         .build()
//!         .await?;
//!
//!     let lock = provider.create_lock("nightly-report");
//!
//!     // One attempt; retrying is up to the caller.
//!     match lock.try_acquire().await {
//!         Ok(handle) => {
//!             println!("Doing critical work...");
//!             handle.release().await?;
//!         }
//!         Err(LockError::LockFailed { .. }) => println!("someone else is running it"),
//!         Err(e) => return Err(e.into()),
//!     }
//!
//!     // Or keep retrying every `try_lock_interval` for up to 5 seconds.
//!     let handle = lock.acquire(Some(Duration::from_secs(5))).await?;
//!     handle.release().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Guarantees and limits
//!
//! - Acquisition succeeds iff more than half of the configured nodes accept
//!   the key; with an even node count, exactly half is a failure.
//! - A minority of unreachable nodes does not prevent acquisition.
//! - Release and renewal only ever touch keys that still hold this
//!   handle's fencing token.
//! - A holder that loses quorum between renewals is not stopped; the lease
//!   TTL bounds how long two holders can overlap. Watch
//!   [`LockHandle::lost_token`] for a best-effort signal.
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `quorum-lock-core`: Core traits, errors and the acquisition context
//! - `quorum-lock-redis`: RedLock over Redis (and in-memory) nodes

// Re-export core types and traits
pub use quorum_lock_core::*;

// Re-export redis backend
pub use quorum_lock_redis::*;
