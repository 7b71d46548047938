//! Storage nodes the lock is spread across.
//!
//! A node is any key/value store offering set-if-absent with a TTL and
//! atomic compare-and-expire / compare-and-delete. Redis provides all three
//! through `SET NX PX` and Lua scripts.

use std::future::Future;
use std::time::Duration;

use fred::prelude::*;
use fred::types::CustomCommand;
use quorum_lock_core::error::{LockError, LockResult};

/// One independent lock-storage node.
///
/// Nodes are cloned into per-request tasks, so clones must be cheap handles
/// onto the same underlying connection.
pub trait LockNode: Clone + Send + Sync + 'static {
    /// Stores `key -> value` with `ttl` unless the key already exists.
    ///
    /// Returns `true` if the key was set.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Resets the TTL of `key` to `ttl`, only if it still holds `value`.
    fn extend_if_owned(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Deletes `key`, only if it still holds `value`.
    fn delete_if_owned(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = LockResult<bool>> + Send;
}

/// Lua script to extend the lock duration.
const EXTEND_SCRIPT_LUA: &str = r#"
    if redis.call('get', KEYS[1]) == ARGV[1] then
        return redis.call('pexpire', KEYS[1], ARGV[2])
    end
    return 0
"#;

/// Lua script to release the lock.
const RELEASE_SCRIPT_LUA: &str = r#"
    if redis.call('get', KEYS[1]) == ARGV[1] then
        return redis.call('del', KEYS[1])
    end
    return 0
"#;

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

fn backend_error(operation: &str, e: RedisError) -> LockError {
    LockError::Backend(Box::new(std::io::Error::other(format!(
        "Redis {operation} failed: {e}"
    ))))
}

async fn eval_owned(
    client: &RedisClient,
    operation: &str,
    args: Vec<RedisValue>,
) -> LockResult<bool> {
    let cmd = CustomCommand::new_static("EVAL", None, false);
    let result: i64 = client
        .custom(cmd, args)
        .await
        .map_err(|e| backend_error(operation, e))?;
    Ok(result == 1)
}

impl LockNode for RedisClient {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        // SET NX returns Some("OK") if key was set, None if key already exists
        let result: Option<String> = self
            .set(
                key,
                value,
                Some(Expiration::PX(ttl_millis(ttl))),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(|e| backend_error("SET NX", e))?;

        Ok(result.is_some())
    }

    async fn extend_if_owned(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let args: Vec<RedisValue> = vec![
            EXTEND_SCRIPT_LUA.into(),
            1_i64.into(), // numkeys
            key.into(),
            value.into(),
            ttl_millis(ttl).into(),
        ];
        eval_owned(self, "EVAL (extend)", args).await
    }

    async fn delete_if_owned(&self, key: &str, value: &str) -> LockResult<bool> {
        let args: Vec<RedisValue> = vec![
            RELEASE_SCRIPT_LUA.into(),
            1_i64.into(), // numkeys
            key.into(),
            value.into(),
        ];
        eval_owned(self, "EVAL (release)", args).await
    }
}
