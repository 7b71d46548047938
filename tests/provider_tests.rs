//! Tests for provider abstraction.

use quorum_lock::{InMemoryNode, RedLockOptions, RedisLockProvider};
use quorum_lock_core::error::LockError;
use quorum_lock_core::traits::{DistributedLock, LockHandle, LockProvider, LockProviderExt};
use std::time::Duration;

mod common;
use common::mock_provider::MockLockProvider;

fn in_memory_provider() -> RedisLockProvider<InMemoryNode> {
    RedisLockProvider::with_nodes(InMemoryNode::cluster(3), RedLockOptions::default()).unwrap()
}

/// Tests that any provider can be used with the same code.
async fn test_provider_abstraction<P: LockProvider>(provider: &P, name: &str) {
    // Create a lock using the provider
    let lock = provider.create_lock(name);
    assert_eq!(lock.name(), name);

    // Try to acquire the lock
    let handle = lock.try_acquire().await.unwrap();

    // A second lock on the same name competes with the first
    let contender = provider.create_lock(name);
    assert!(matches!(
        contender.try_acquire().await,
        Err(LockError::LockFailed { .. })
    ));

    // Release the lock
    handle.release().await.unwrap();

    // Now we should be able to acquire it again
    let handle2 = contender.acquire(Some(Duration::from_secs(5))).await;
    assert!(handle2.is_ok());
}

/// Tests provider extension methods work with any provider.
async fn test_provider_extensions<P: LockProvider + LockProviderExt>(provider: &P, name: &str) {
    // Test acquire_lock extension method
    let handle = provider
        .acquire_lock(name, Some(Duration::from_millis(100)))
        .await;
    assert!(handle.is_ok());

    // Test try_acquire_lock extension method
    let handle2 = provider.try_acquire_lock(name).await;
    // Should fail because lock is held
    assert!(matches!(handle2, Err(LockError::LockFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_in_memory_provider_abstraction() {
    test_provider_abstraction(&in_memory_provider(), "test-resource-abstraction").await;
}

#[tokio::test(start_paused = true)]
async fn test_mock_provider_abstraction() {
    test_provider_abstraction(&MockLockProvider::new(), "test-resource").await;
}

#[tokio::test(start_paused = true)]
async fn test_in_memory_provider_extensions() {
    test_provider_extensions(&in_memory_provider(), "test-resource-extensions").await;
}

#[tokio::test(start_paused = true)]
async fn test_mock_provider_extensions() {
    test_provider_extensions(&MockLockProvider::new(), "test-resource").await;
}
