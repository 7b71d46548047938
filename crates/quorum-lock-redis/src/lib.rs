//! Redis backend for quorum locks.
//!
//! Implements RedLock: a lock is held while a strict majority of
//! independent Redis nodes store the holder's fencing token. Nodes are
//! abstracted by [`LockNode`]; [`fred`]'s `RedisClient` and the in-process
//! [`InMemoryNode`] both implement it.

pub mod handle;
pub mod lock;
pub mod memory;
pub mod node;
pub mod options;
pub mod provider;
pub mod redlock;

pub use handle::RedisLockHandle;
pub use lock::RedisDistributedLock;
pub use memory::InMemoryNode;
pub use node::LockNode;
pub use options::RedLockOptions;
pub use provider::{RedisLockProvider, RedisLockProviderBuilder};
pub use redlock::RedLockReleaseSummary;
