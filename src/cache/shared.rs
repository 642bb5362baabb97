//! L2 Shared Cache
//!
//! A thin adapter over a shared network key/value store. The adapter owns
//! the per-operation timeout; tier failures surface as
//! [`Error::CacheTierUnavailable`] and the composite degrades them to
//! miss/no-op behavior. Absent values are represented by `None`, never by a
//! cached sentinel.

use crate::cache::key::CacheKey;
use crate::clock::ClockRef;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// SharedStore Trait
// =============================================================================

/// Raw operations against the shared key/value store
///
/// Keys are the `namespace::id` wire form; values are codec-produced bytes.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Fetch the raw bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value` under `key` with an absolute expiry of `now + ttl`
    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Remove `key`
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key starting with `prefix`; returns the number removed
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// Readiness probe
    async fn ping(&self) -> Result<()>;
}

/// Shared store handle
pub type SharedStoreRef = Arc<dyn SharedStore>;

// =============================================================================
// Shared Cache Adapter
// =============================================================================

/// Namespace-aware adapter over a [`SharedStore`]
pub struct SharedCache {
    store: SharedStoreRef,
    op_timeout: Duration,
}

impl SharedCache {
    pub fn new(store: SharedStoreRef, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::CacheTierUnavailable(format!(
                "{op} timed out after {:?}",
                self.op_timeout
            ))),
        }
    }

    /// Fetch the encoded value for a key
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>> {
        let wire = key.wire();
        self.bounded("get", self.store.get(&wire)).await
    }

    /// Store an encoded value with the namespace TTL
    pub async fn put(&self, key: &CacheKey, value: Bytes, ttl: Duration) -> Result<()> {
        let wire = key.wire();
        self.bounded("put", self.store.put(&wire, value, ttl)).await
    }

    /// Remove a single key
    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        let wire = key.wire();
        self.bounded("delete", self.store.delete(&wire)).await
    }

    /// Remove every key of a namespace
    pub async fn invalidate_namespace(&self, namespace: &str) -> Result<u64> {
        let prefix = CacheKey::namespace_prefix(namespace);
        self.bounded("delete_prefix", self.store.delete_prefix(&prefix))
            .await
    }

    /// Readiness probe against the backing store
    pub async fn ping(&self) -> Result<()> {
        self.bounded("ping", self.store.ping()).await
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// In-process [`SharedStore`] used by tests and the standalone binary
///
/// TTL is enforced against the injected clock; expired values are dropped
/// lazily on read.
pub struct MemoryStore {
    values: DashMap<String, StoredValue>,
    clock: ClockRef,
}

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Bytes,
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl MemoryStore {
    pub fn new(clock: ClockRef) -> Self {
        Self {
            values: DashMap::new(),
            clock,
        }
    }

    /// Number of live (possibly expired, not yet reclaimed) keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let now = self.clock.now();
        match self.values.get(key) {
            Some(stored) if stored.expires_at <= now => {
                drop(stored);
                self.values.remove(key);
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.bytes.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(crate::clock::to_chrono(ttl))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        self.values.insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut removed = 0u64;
        self.values.retain(|key, _| {
            if key.starts_with(prefix) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
