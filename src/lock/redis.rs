//! Redis-Backed Lock Store
//!
//! Cluster-wide locks over the same pool the shared cache uses.
//! Acquisition is `SET key holder NX PX lease`; the PX expiry is the
//! watchdog that force-releases a crashed or overrunning holder. Release
//! runs a compare-and-delete script so only the current holder can remove
//! the lock.

use crate::error::{Error, Result};
use crate::lock::LockStore;
use async_trait::async_trait;
use deadpool_redis::redis::{self, Script};
use deadpool_redis::Pool;
use std::time::Duration;

/// Delete the key only when its value matches the caller's holder nonce.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

/// Redis-backed [`LockStore`]
pub struct RedisLockStore {
    pool: Pool,
    release: Script,
}

impl RedisLockStore {
    /// Build over an existing pool (shared with the cache store)
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            release: Script::new(RELEASE_SCRIPT),
        }
    }
}

fn unavailable(e: impl std::fmt::Display) -> Error {
    Error::CacheTierUnavailable(e.to_string())
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(&self, key: &str, holder: &str, lease: Duration) -> Result<bool> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        let lease_ms = lease.as_millis().max(1) as u64;

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(holder)
            .arg("NX")
            .arg("PX")
            .arg(lease_ms)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        let removed: i64 = self
            .release
            .key(key)
            .arg(holder)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(removed == 1)
    }
}
