//! Redis-Backed Shared Store
//!
//! [`SharedStore`] implementation over a deadpool-managed Redis pool.
//! Namespace invalidation walks the keyspace with cursored SCAN so it never
//! blocks the server the way a bare KEYS call would.

use crate::cache::shared::SharedStore;
use crate::config::L2Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Pool, PoolConfig, Runtime};
use std::time::Duration;
use tracing::{debug, info};

/// Keys deleted per SCAN round during namespace invalidation
const SCAN_BATCH: usize = 200;

/// Redis-backed shared cache store
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Connect a pool per the L2 configuration
    ///
    /// `pool_min_idle` connections are established eagerly so the first
    /// requests after startup do not pay the connect cost.
    pub async fn connect(config: &L2Config) -> Result<Self> {
        let mut pool_config = deadpool_redis::Config::from_url(&config.url);
        pool_config.pool = Some(PoolConfig::new(config.pool_max_size));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::Configuration(format!("redis pool: {e}")))?;

        let warm = config.pool_min_idle.min(config.pool_max_size);
        for _ in 0..warm {
            let _conn = pool.get().await.map_err(unavailable)?;
        }
        info!(url = %config.url, warmed = warm, "Connected shared cache pool");

        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection> {
        self.pool.get().await.map_err(unavailable)
    }

    /// Handle to the underlying pool, shared with the lock store
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }
}

fn unavailable(e: impl std::fmt::Display) -> Error {
    Error::CacheTierUnavailable(e.to_string())
}

/// Escape the glob metacharacters Redis MATCH understands, so arbitrary ids
/// never widen a namespace pattern.
fn escape_match(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.conn().await?;
        let raw: Option<Vec<u8>> = conn.get(key).await.map_err(unavailable)?;
        Ok(raw.map(Bytes::from))
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value.as_ref(), ttl_secs)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await.map_err(unavailable)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.conn().await?;
        let pattern = format!("{}*", escape_match(prefix));

        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;

            if !keys.is_empty() {
                let removed: u64 = conn.del(keys).await.map_err(unavailable)?;
                deleted += removed;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(prefix = %prefix, deleted = deleted, "Invalidated namespace on shared tier");
        Ok(deleted)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
