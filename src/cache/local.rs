//! L1 In-Process Cache
//!
//! A bounded, sharded map tuned for read-heavy workloads. Each shard keeps
//! its entries in access order, so the front of a shard is its least
//! recently used entry; a read moves the entry to the back. Capacity is
//! divided evenly across shards, and a shard over its share evicts from
//! its own front, so a write only ever displaces older entries of the same
//! shard, never itself. Ties among never-read entries fall back to
//! insertion order, oldest first.
//!
//! Expired entries are dropped lazily when a read finds them; a periodic
//! [`LocalCache::sweep`] reclaims the ones no read ever touches again.

use crate::cache::entry::{Entry, L1TtlPolicy};
use crate::cache::key::CacheKey;
use crate::clock::ClockRef;
use crate::config::L1Config;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// =============================================================================
// Statistics
// =============================================================================

/// Counters kept by the in-process tier
#[derive(Debug, Default)]
struct LocalStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

/// Point-in-time view of the tier's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed by capacity pressure
    pub evictions: u64,
    /// Entries removed because their TTL or idle window elapsed
    pub expired: u64,
    pub size: usize,
}

impl LocalStatsSnapshot {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Local Cache
// =============================================================================

type Shard<V> = IndexMap<String, Entry<V>>;

/// Bounded in-process cache with per-entry TTL and LRU eviction
pub struct LocalCache<V> {
    shards: Vec<RwLock<Shard<V>>>,
    clock: ClockRef,
    default_policy: L1TtlPolicy,
    /// Entries one shard may hold; shard_capacity * shards.len() <= max_size
    shard_capacity: usize,
    len: AtomicUsize,
    seq: AtomicU64,
    stats: LocalStats,
}

impl<V> LocalCache<V> {
    /// Create a cache from the L1 configuration
    pub fn new(config: &L1Config, clock: ClockRef) -> Self {
        let max_size = config.max_size.max(1);
        let shard_count = config.shard_count.clamp(1, max_size);
        // shard_count <= max_size, so every shard gets at least one slot
        let shard_capacity = max_size / shard_count;
        let shards = (0..shard_count)
            .map(|_| RwLock::new(IndexMap::new()))
            .collect();

        Self {
            shards,
            clock,
            default_policy: L1TtlPolicy {
                ttl_write: config.ttl_write,
                ttl_access: config.ttl_access,
            },
            shard_capacity,
            len: AtomicUsize::new(0),
            seq: AtomicU64::new(0),
            stats: LocalStats::default(),
        }
    }

    fn shard_for(&self, key: &CacheKey) -> &RwLock<Shard<V>> {
        &self.shards[key.shard_index(self.shards.len())]
    }

    /// Look up a non-expired entry, refreshing its access time and LRU slot
    pub fn get(&self, key: &CacheKey) -> Option<V>
    where
        V: Clone,
    {
        let now = self.clock.now();
        let wire = key.wire();
        let mut shard = self.shard_for(key).write();

        match shard.shift_remove(&wire) {
            Some(entry) if entry.is_expired(now) => {
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(mut entry) => {
                entry.record_access(now);
                let value = entry.value.clone();
                // Re-insert at the back: most recently used
                shard.insert(wire, entry);
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite under the configured default policy
    ///
    /// Returns the number of entries evicted to stay within capacity.
    pub fn put(&self, key: &CacheKey, value: V) -> usize {
        let policy = self.default_policy;
        self.put_with_policy(key, value, &policy)
    }

    /// Insert or overwrite under an explicit TTL policy
    pub fn put_with_policy(&self, key: &CacheKey, value: V, policy: &L1TtlPolicy) -> usize {
        let now = self.clock.now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let entry = Entry::new(value, now, seq, policy);
        let wire = key.wire();

        let mut shard = self.shard_for(key).write();
        if shard.shift_remove(&wire).is_none() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        shard.insert(wire, entry);

        // Over its share: evict from the front of this shard (its LRU end).
        // The fresh entry sits at the back and the share is at least one
        // slot, so it is never its own victim.
        let mut evicted = 0;
        while shard.len() > self.shard_capacity {
            if shard.shift_remove_index(0).is_none() {
                break;
            }
            self.len.fetch_sub(1, Ordering::Relaxed);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            evicted += 1;
        }
        evicted
    }

    /// Remove an entry unconditionally; true if it was present
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut shard = self.shard_for(key).write();
        if shard.shift_remove(&key.wire()).is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        for shard in &self.shards {
            let mut shard = shard.write();
            let removed = shard.len();
            shard.clear();
            self.len.fetch_sub(removed, Ordering::Relaxed);
        }
    }

    /// Drop every entry of a namespace; returns the number removed
    pub fn invalidate_namespace(&self, namespace: &str) -> usize {
        let prefix = CacheKey::namespace_prefix(namespace);
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.write();
            let before = shard.len();
            shard.retain(|wire, _| !wire.starts_with(&prefix));
            removed += before - shard.len();
        }
        self.len.fetch_sub(removed, Ordering::Relaxed);
        removed
    }

    /// Reclaim expired entries whose keys have not been read since expiry
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.write();
            let before = shard.len();
            shard.retain(|_, entry| !entry.is_expired(now));
            removed += before - shard.len();
        }
        self.len.fetch_sub(removed, Ordering::Relaxed);
        self.stats.expired.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Current entry count
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot
    pub fn stats(&self) -> LocalStatsSnapshot {
        LocalStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            expired: self.stats.expired.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}
