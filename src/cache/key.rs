//! Cache Keys
//!
//! A key is a `(namespace, id)` pair. The namespace partitions the key space
//! by TTL policy and invalidation scope; the id is any printable string
//! unique within its namespace.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Separator between namespace and id in the shared-tier wire form
pub const KEY_SEPARATOR: &str = "::";

/// Unique identifier for a cached value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Logical cache partition (e.g. "productById", "categories")
    pub namespace: String,
    /// Identifier within the namespace
    pub id: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    /// Wire form used by the shared tier: `namespace::id`
    pub fn wire(&self) -> String {
        format!("{}{}{}", self.namespace, KEY_SEPARATOR, self.id)
    }

    /// Prefix matching every key of a namespace on the wire
    pub fn namespace_prefix(namespace: &str) -> String {
        format!("{namespace}{KEY_SEPARATOR}")
    }

    /// Shard index for `shard_count`-way sharded structures
    #[inline]
    pub fn shard_index(&self, shard_count: usize) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        (hasher.finish() as usize) % shard_count.max(1)
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, KEY_SEPARATOR, self.id)
    }
}
