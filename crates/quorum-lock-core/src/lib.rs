//! Core traits and types for quorum-based distributed locks.

pub mod context;
pub mod error;
pub mod prelude;
pub mod timeout;
pub mod traits;

pub use context::AcquireContext;
pub use error::{LockError, LockResult};
pub use prelude::*;
