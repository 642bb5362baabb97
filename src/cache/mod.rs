//! Two-Level Caching
//!
//! The read path of the catalog service: a fast in-process tier (L1) in
//! front of a shared network tier (L2), composed by a read-through
//! orchestrator that backfills L1 from L2 hits and falls through to a
//! loader on a full miss.
//!
//! ```text
//! lookup ──► L1 (in-process) ──► L2 (shared) ──► loader (origin store)
//!                │ hit               │ hit            │
//!                ▼                   ▼ backfill L1    ▼ write L2 then L1
//!              return              return           return
//! ```

pub mod codec;
pub mod entry;
pub mod key;
pub mod local;
pub mod redis;
pub mod shared;
pub mod two_level;

pub use codec::{Codec, JsonCodec};
pub use entry::{Entry, L1TtlPolicy};
pub use key::CacheKey;
pub use local::{LocalCache, LocalStatsSnapshot};
pub use redis::RedisStore;
pub use shared::{MemoryStore, SharedCache, SharedStore, SharedStoreRef};
pub use two_level::TwoLevel;

use std::time::Duration;

// =============================================================================
// Lookup Source
// =============================================================================

/// Which level served a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// In-process tier
    L1,
    /// Shared tier
    L2,
    /// Fell through to the loader
    Origin,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::L1 => "L1",
            Source::L2 => "L2",
            Source::Origin => "ORIGIN",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Load Result
// =============================================================================

/// A served value tagged with the level that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult<V> {
    pub value: V,
    pub source: Source,
}

impl<V> LoadResult<V> {
    pub fn new(value: V, source: Source) -> Self {
        Self { value, source }
    }

    /// Map the value through a fallible conversion, keeping the source tag
    pub fn try_map<U, F>(self, convert: F) -> crate::error::Result<LoadResult<U>>
    where
        F: FnOnce(V) -> crate::error::Result<U>,
    {
        Ok(LoadResult {
            value: convert(self.value)?,
            source: self.source,
        })
    }
}

// =============================================================================
// Load Options
// =============================================================================

/// Per-lookup policy handed to the composite by the catalog service
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// L1 policy; `None` keeps the namespace out of the in-process tier
    pub l1: Option<L1TtlPolicy>,
    /// Namespace TTL on the shared tier
    pub l2_ttl: Duration,
    /// Wrap the loader in the stampede guard
    pub singleflight: bool,
}

impl LoadOptions {
    /// L2-only options with singleflight off
    pub fn l2_only(l2_ttl: Duration) -> Self {
        Self {
            l1: None,
            l2_ttl,
            singleflight: false,
        }
    }

    /// Options caching in both tiers, singleflight off
    pub fn both_tiers(l1: L1TtlPolicy, l2_ttl: Duration) -> Self {
        Self {
            l1: Some(l1),
            l2_ttl,
            singleflight: false,
        }
    }

    pub fn with_singleflight(mut self, enabled: bool) -> Self {
        self.singleflight = enabled;
        self
    }
}
