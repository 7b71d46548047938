//! In-process lock node.
//!
//! Behaves like a single Redis instance for the three lock primitives. Key
//! expiry follows the tokio clock, so tests running with paused time can
//! fast-forward through leases. Nodes can be taken offline to simulate
//! crashes and partitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use quorum_lock_core::error::{LockError, LockResult};
use tokio::time::Instant;

use crate::node::LockNode;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug)]
struct Shared {
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
    latency: Mutex<Duration>,
}

/// A lock node held entirely in memory.
///
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct InMemoryNode {
    shared: Arc<Shared>,
}

impl Default for InMemoryNode {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNode {
    /// An empty node that is online and answers without delay.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                available: AtomicBool::new(true),
                latency: Mutex::new(Duration::ZERO),
            }),
        }
    }

    /// Creates `count` independent nodes.
    pub fn cluster(count: usize) -> Vec<Self> {
        (0..count).map(|_| Self::new()).collect()
    }

    /// Takes the node offline (`false`) or back online (`true`).
    ///
    /// Offline nodes fail every request but keep their data, like a
    /// partitioned server.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::SeqCst)
    }

    /// Delays every request by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.shared.latency) = latency;
    }

    /// Current value of `key`, ignoring expired entries.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        lock(&self.shared.entries)
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    /// Remaining TTL of `key`.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        lock(&self.shared.entries)
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at - now)
    }

    /// Unconditionally stores `key -> value`, as another client would after
    /// our lease expired.
    pub fn overwrite(&self, key: &str, value: &str, ttl: Duration) {
        lock(&self.shared.entries).insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drops every entry.
    pub fn flush(&self) {
        lock(&self.shared.entries).clear();
    }

    async fn enter(&self) -> LockResult<MutexGuard<'_, HashMap<String, Entry>>> {
        let latency = *lock(&self.shared.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if !self.is_available() {
            return Err(LockError::Connection(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "in-memory node is offline",
            ))));
        }

        let mut entries = lock(&self.shared.entries);
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(entries)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LockNode for InMemoryNode {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let mut entries = self.enter().await?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    async fn extend_if_owned(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let mut entries = self.enter().await?;
        match entries.get_mut(key) {
            Some(entry) if entry.value == value => {
                entry.expires_at = Instant::now() + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_owned(&self, key: &str, value: &str) -> LockResult<bool> {
        let mut entries = self.enter().await?;
        if entries.get(key).is_some_and(|entry| entry.value == value) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_is_exclusive() {
        let node = InMemoryNode::new();
        assert!(node.set_if_absent("k", "a", TTL).await.unwrap());
        assert!(!node.set_if_absent("k", "b", TTL).await.unwrap());
        assert_eq!(node.get("k").as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let node = InMemoryNode::new();
        assert!(node.set_if_absent("k", "a", TTL).await.unwrap());
        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        assert_eq!(node.get("k"), None);
        assert!(node.set_if_absent("k", "b", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_and_delete_check_the_token() {
        let node = InMemoryNode::new();
        node.set_if_absent("k", "a", TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!node.extend_if_owned("k", "b", TTL).await.unwrap());
        assert!(node.extend_if_owned("k", "a", TTL).await.unwrap());
        assert_eq!(node.ttl("k"), Some(TTL));

        assert!(!node.delete_if_owned("k", "b").await.unwrap());
        assert!(node.delete_if_owned("k", "a").await.unwrap());
        assert_eq!(node.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_node_fails_but_keeps_data() {
        let node = InMemoryNode::new();
        node.set_if_absent("k", "a", TTL).await.unwrap();

        node.set_available(false);
        assert!(matches!(
            node.set_if_absent("other", "a", TTL).await,
            Err(LockError::Connection(_))
        ));

        node.set_available(true);
        assert_eq!(node.get("k").as_deref(), Some("a"));
    }
}
