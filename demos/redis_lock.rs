//! Example: Using quorum locks over several Redis servers
//!
//! Run with: `cargo run --example redis_lock`
//!
//! Requires Redis servers. Set REDLOCK_URLS to a comma-separated list of
//! independent servers, or REDIS_URL for a single one.

use quorum_lock::RedisLockProvider;
use quorum_lock_core::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = RedisLockProvider::builder().urls_from_env();
    if std::env::var("REDLOCK_URLS").is_err() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        builder = builder.url(redis_url);
    }

    println!("Connecting to Redis...");
    let provider = builder.build().await?;
    println!("Created lock provider over {} node(s)", provider.nodes().len());

    // Create a lock by name
    let lock = provider.create_lock("example-resource");
    println!("Created lock: {}", lock.name());

    // Retry every second for up to 5 seconds
    println!("Acquiring lock with 5 second timeout...");
    let handle = lock.acquire(Some(Duration::from_secs(5))).await?;
    println!(
        "Lock acquired on nodes {:?} (will be automatically extended)",
        handle.acquired_nodes()
    );

    // The lease is renewed every 10 seconds (default) while we work
    println!("Doing long-running work...");
    tokio::time::sleep(Duration::from_secs(15)).await;
    println!("Work completed");

    let summary = handle.release_and_wait().await?;
    println!("Lock released on {} node(s)", summary.released);

    // A single attempt reports failure instead of waiting
    let other = provider.create_lock("example-resource");
    let _held = other.try_acquire().await?;
    match provider.create_lock("example-resource").try_acquire().await {
        Err(LockError::LockFailed { acquired, required, .. }) => {
            println!("Second holder refused: {acquired} of {required} required nodes")
        }
        Ok(_) => println!("Unexpectedly acquired a held lock"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
