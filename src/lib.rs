//! Catalog Cache - Read-Heavy Product Catalog Core
//!
//! A two-level read-through cache in front of a relational product store,
//! with per-key stampede protection and startup warming.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        ProductService                            │
//! │   namespaces · key derivation · TTL policy · invalidation       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                      TwoLevel composite                          │
//! │   ┌──────────────┐       ┌──────────────┐      ┌─────────────┐   │
//! │   │  LocalCache  │──────►│ SharedCache  │─────►│   loader    │   │
//! │   │  (L1, LRU)   │ miss  │ (L2, Redis)  │ miss │ (the store) │   │
//! │   └──────────────┘       └──────────────┘      └──────┬──────┘   │
//! │          ▲ backfill on L2 hit                         │          │
//! │          └────────── write-through L2 then L1 ────────┘          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   StampedeGuard: at most one loader per key, cluster-wide        │
//! │   CacheWarmer:   pre-populates both tiers before readiness       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: the two tiers, the codec, and the composite
//! - [`lock`]: cluster-wide singleflight coordination
//! - [`catalog`]: the product domain bound to concrete cache policies
//! - [`config`]: the knob surface with production defaults
//! - [`metrics`]: the sink the core reports through
//! - [`error`]: the shared error taxonomy

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod lock;
pub mod metrics;

// Re-export commonly used types
pub use cache::{
    CacheKey, Codec, JsonCodec, L1TtlPolicy, LoadOptions, LoadResult, LocalCache,
    LocalStatsSnapshot, MemoryStore, RedisStore, SharedCache, SharedStore, Source, TwoLevel,
};

pub use catalog::{
    CacheWarmer, CatalogValue, MemoryProductStore, Namespace, Product, ProductService,
    ProductStore, ProductStoreRef, WarmSummary,
};

pub use clock::{Clock, ClockRef, ManualClock, SystemClock};

pub use config::{CacheConfig, L1Config, L2Config, LockConfig, WarmerConfig};

pub use error::{Error, Result};

pub use lock::{GuardOutcome, LockStore, LockStoreRef, MemoryLockStore, RedisLockStore, StampedeGuard};

pub use metrics::{MetricsSink, MetricsSnapshot, PrometheusSink, RecordingSink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
