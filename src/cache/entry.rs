//! L1 Entries
//!
//! An entry's lifetime is bounded by an absolute TTL stamped at write time
//! and, optionally, an idle TTL measured from the last access. Whichever
//! fires first expires the entry.

use crate::clock::to_chrono;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// TTL policy applied to an L1 entry at write time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1TtlPolicy {
    /// Absolute lifetime from the write
    pub ttl_write: Duration,
    /// Idle lifetime from the last access; `None` disables idle expiry
    pub ttl_access: Option<Duration>,
}

/// A value held by the in-process tier
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// The cached value, stored by identity
    pub value: V,
    /// Write timestamp
    pub inserted_at: DateTime<Utc>,
    /// Monotonic insertion sequence, breaks LRU ties (older evicts first)
    pub inserted_seq: u64,
    /// Last read timestamp
    pub last_access_at: DateTime<Utc>,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
    /// Idle lifetime, if enabled
    pub ttl_access: Option<Duration>,
}

impl<V> Entry<V> {
    /// Create an entry stamped at `now` under `policy`
    pub fn new(value: V, now: DateTime<Utc>, seq: u64, policy: &L1TtlPolicy) -> Self {
        Self {
            value,
            inserted_at: now,
            inserted_seq: seq,
            last_access_at: now,
            expires_at: now
                .checked_add_signed(to_chrono(policy.ttl_write))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ttl_access: policy.ttl_access,
        }
    }

    /// Check whether the entry has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if now >= self.expires_at {
            return true;
        }
        match self.ttl_access {
            Some(idle) => now - self.last_access_at >= to_chrono(idle),
            None => false,
        }
    }

    /// Record a read at `now`
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.last_access_at = now;
    }
}
