//! Cache Metrics
//!
//! The core reports its observable counters and timers through a
//! [`MetricsSink`] so the exporter endpoint stays outside the core.
//! [`PrometheusSink`] registers the full set on a `prometheus::Registry`;
//! [`RecordingSink`] keeps plain atomics for assertions in tests.

use crate::error::{Error, Result};
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Label Values
// =============================================================================

/// Which cache tier served a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTier {
    L1,
    L2,
}

impl HitTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitTier::L1 => "l1",
            HitTier::L2 => "l2",
        }
    }
}

/// Outcome of a distributed lock acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    Timeout,
}

impl LockOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockOutcome::Acquired => "acquired",
            LockOutcome::Timeout => "timeout",
        }
    }
}

// =============================================================================
// MetricsSink Trait
// =============================================================================

/// Sink for the counters and timers the core emits
///
/// One method per metric keeps call sites free of label plumbing.
pub trait MetricsSink: Send + Sync {
    /// `cache.hit{tier=l1|l2}`
    fn cache_hit(&self, tier: HitTier);
    /// `cache.miss`
    fn cache_miss(&self);
    /// `cache.eviction{tier=l1}`
    fn cache_eviction(&self);
    /// `cache.load.duration`
    fn load_duration(&self, elapsed: Duration);
    /// `cache.load.origin`: loads that reached the origin store
    fn load_origin(&self);
    /// `cache.tier.unavailable`: shared tier failures degraded to miss/no-op
    fn tier_unavailable(&self);
    /// `store.query.total`
    fn store_query(&self);
    /// `lock.acquire.total{outcome=acquired|timeout}`
    fn lock_acquire(&self, outcome: LockOutcome);
    /// `lock.hold.duration`
    fn lock_hold(&self, held: Duration);
}

/// Shared sink handle
pub type MetricsRef = Arc<dyn MetricsSink>;

// =============================================================================
// Prometheus Sink
// =============================================================================

/// Prometheus-backed sink
pub struct PrometheusSink {
    cache_hits: IntCounterVec,
    cache_misses: IntCounter,
    cache_evictions: IntCounter,
    load_duration: Histogram,
    load_origin: IntCounter,
    tier_unavailable: IntCounter,
    store_queries: IntCounter,
    lock_acquires: IntCounterVec,
    lock_hold: Histogram,
}

impl PrometheusSink {
    /// Create the sink and register every collector on `registry`
    pub fn register(registry: &Registry) -> Result<Self> {
        let cache_hits = IntCounterVec::new(
            Opts::new("cache_hit_total", "Cache hits by tier"),
            &["tier"],
        )
        .map_err(prom_err)?;
        let cache_misses =
            IntCounter::new("cache_miss_total", "Cache misses across both tiers").map_err(prom_err)?;
        let cache_evictions = IntCounter::new(
            "cache_eviction_total",
            "Entries evicted from the in-process tier",
        )
        .map_err(prom_err)?;
        let load_duration = Histogram::with_opts(HistogramOpts::new(
            "cache_load_duration_seconds",
            "Loader execution time on cache miss",
        ))
        .map_err(prom_err)?;
        let load_origin = IntCounter::new(
            "cache_load_origin_total",
            "Lookups that fell through to the origin store",
        )
        .map_err(prom_err)?;
        let tier_unavailable = IntCounter::new(
            "cache_tier_unavailable_total",
            "Shared tier failures degraded to miss or no-op",
        )
        .map_err(prom_err)?;
        let store_queries =
            IntCounter::new("store_query_total", "Queries issued to the product store").map_err(prom_err)?;
        let lock_acquires = IntCounterVec::new(
            Opts::new("lock_acquire_total", "Distributed lock acquisitions by outcome"),
            &["outcome"],
        )
        .map_err(prom_err)?;
        let lock_hold = Histogram::with_opts(HistogramOpts::new(
            "lock_hold_duration_seconds",
            "Time a stampede lock was held",
        ))
        .map_err(prom_err)?;

        registry.register(Box::new(cache_hits.clone())).map_err(prom_err)?;
        registry.register(Box::new(cache_misses.clone())).map_err(prom_err)?;
        registry.register(Box::new(cache_evictions.clone())).map_err(prom_err)?;
        registry.register(Box::new(load_duration.clone())).map_err(prom_err)?;
        registry.register(Box::new(load_origin.clone())).map_err(prom_err)?;
        registry.register(Box::new(tier_unavailable.clone())).map_err(prom_err)?;
        registry.register(Box::new(store_queries.clone())).map_err(prom_err)?;
        registry.register(Box::new(lock_acquires.clone())).map_err(prom_err)?;
        registry.register(Box::new(lock_hold.clone())).map_err(prom_err)?;

        Ok(Self {
            cache_hits,
            cache_misses,
            cache_evictions,
            load_duration,
            load_origin,
            tier_unavailable,
            store_queries,
            lock_acquires,
            lock_hold,
        })
    }
}

fn prom_err(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics registration failed: {e}"))
}

impl MetricsSink for PrometheusSink {
    fn cache_hit(&self, tier: HitTier) {
        self.cache_hits.with_label_values(&[tier.as_str()]).inc();
    }

    fn cache_miss(&self) {
        self.cache_misses.inc();
    }

    fn cache_eviction(&self) {
        self.cache_evictions.inc();
    }

    fn load_duration(&self, elapsed: Duration) {
        self.load_duration.observe(elapsed.as_secs_f64());
    }

    fn load_origin(&self) {
        self.load_origin.inc();
    }

    fn tier_unavailable(&self) {
        self.tier_unavailable.inc();
    }

    fn store_query(&self) {
        self.store_queries.inc();
    }

    fn lock_acquire(&self, outcome: LockOutcome) {
        self.lock_acquires.with_label_values(&[outcome.as_str()]).inc();
    }

    fn lock_hold(&self, held: Duration) {
        self.lock_hold.observe(held.as_secs_f64());
    }
}

// =============================================================================
// Recording Sink
// =============================================================================

/// Atomic-counter sink for tests and the standalone binary
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub l1_hits: AtomicU64,
    pub l2_hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub origin_loads: AtomicU64,
    pub tier_unavailable: AtomicU64,
    pub store_queries: AtomicU64,
    pub locks_acquired: AtomicU64,
    pub lock_timeouts: AtomicU64,
    pub load_duration_micros: AtomicU64,
    pub lock_hold_micros: AtomicU64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time snapshot of the counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            origin_loads: self.origin_loads.load(Ordering::Relaxed),
            tier_unavailable: self.tier_unavailable.load(Ordering::Relaxed),
            store_queries: self.store_queries.load(Ordering::Relaxed),
            locks_acquired: self.locks_acquired.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for RecordingSink {
    fn cache_hit(&self, tier: HitTier) {
        match tier {
            HitTier::L1 => self.l1_hits.fetch_add(1, Ordering::Relaxed),
            HitTier::L2 => self.l2_hits.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn cache_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn cache_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn load_duration(&self, elapsed: Duration) {
        self.load_duration_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    fn load_origin(&self) {
        self.origin_loads.fetch_add(1, Ordering::Relaxed);
    }

    fn tier_unavailable(&self) {
        self.tier_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    fn store_query(&self) {
        self.store_queries.fetch_add(1, Ordering::Relaxed);
    }

    fn lock_acquire(&self, outcome: LockOutcome) {
        match outcome {
            LockOutcome::Acquired => self.locks_acquired.fetch_add(1, Ordering::Relaxed),
            LockOutcome::Timeout => self.lock_timeouts.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn lock_hold(&self, held: Duration) {
        self.lock_hold_micros
            .fetch_add(held.as_micros() as u64, Ordering::Relaxed);
    }
}

/// Point-in-time view of a [`RecordingSink`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub origin_loads: u64,
    pub tier_unavailable: u64,
    pub store_queries: u64,
    pub locks_acquired: u64,
    pub lock_timeouts: u64,
}

impl MetricsSnapshot {
    /// Hit ratio across both tiers (0.0 when no lookups recorded)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.l1_hits + self.l2_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_counts() {
        let sink = RecordingSink::new();

        sink.cache_hit(HitTier::L1);
        sink.cache_hit(HitTier::L1);
        sink.cache_hit(HitTier::L2);
        sink.cache_miss();
        sink.lock_acquire(LockOutcome::Acquired);
        sink.lock_acquire(LockOutcome::Timeout);
        sink.tier_unavailable();

        let snap = sink.snapshot();
        assert_eq!(snap.l1_hits, 2);
        assert_eq!(snap.l2_hits, 1);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.locks_acquired, 1);
        assert_eq!(snap.lock_timeouts, 1);
        assert_eq!(snap.tier_unavailable, 1);
        assert!((snap.hit_ratio() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_prometheus_sink_registers_once() {
        let registry = Registry::new();
        let sink = PrometheusSink::register(&registry).unwrap();

        sink.cache_hit(HitTier::L1);
        sink.cache_miss();
        sink.store_query();
        sink.load_duration(Duration::from_millis(12));

        // Double registration of the same metric names must fail
        assert!(PrometheusSink::register(&registry).is_err());

        let families = registry.gather();
        assert!(families.iter().any(|f| f.get_name() == "cache_hit_total"));
        assert!(families.iter().any(|f| f.get_name() == "store_query_total"));
    }

    #[test]
    fn test_hit_ratio_empty() {
        assert_eq!(MetricsSnapshot::default().hit_ratio(), 0.0);
    }
}
