//! Two-Level Composite Cache
//!
//! The read/write orchestrator over L1 and L2. Reads probe L1, then L2
//! (backfilling L1 on a hit), then invoke the loader; loaded values are
//! written through L2 first, then L1, so the in-process tier is never
//! fresher than what the shared tier just accepted. Invalidation runs
//! L1-first for the opposite reason: a racing reader must not repopulate
//! L1 from a shared-tier read that started before the shared delete.
//!
//! Loader failures are never cached, and no sentinel is ever written for
//! an absent value.

use crate::cache::codec::Codec;
use crate::cache::key::CacheKey;
use crate::cache::local::{LocalCache, LocalStatsSnapshot};
use crate::cache::shared::SharedCache;
use crate::cache::{LoadOptions, LoadResult, Source};
use crate::error::Result;
use crate::lock::{GuardOutcome, StampedeGuard};
use crate::metrics::{HitTier, MetricsRef};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Read-through, write-through composite over both cache tiers
pub struct TwoLevel<V> {
    l1: LocalCache<V>,
    l2: SharedCache,
    codec: Arc<dyn Codec<V>>,
    guard: Arc<StampedeGuard>,
    metrics: MetricsRef,
}

impl<V> TwoLevel<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        l1: LocalCache<V>,
        l2: SharedCache,
        codec: Arc<dyn Codec<V>>,
        guard: Arc<StampedeGuard>,
        metrics: MetricsRef,
    ) -> Self {
        Self {
            l1,
            l2,
            codec,
            guard,
            metrics,
        }
    }

    /// Read-through lookup
    ///
    /// Probes L1 then L2; on a full miss invokes `loader` and writes the
    /// result through both tiers. With `options.singleflight` the loader is
    /// wrapped by the stampede guard, and the cache is re-checked after the
    /// lock is won: a previous holder usually populated it during the wait.
    /// A lock wait timeout degrades to one unprotected load.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &CacheKey,
        options: &LoadOptions,
        loader: F,
    ) -> Result<LoadResult<V>>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<V>> + Send,
    {
        if let Some(hit) = self.probe(key, options).await {
            return Ok(hit);
        }
        self.metrics.cache_miss();

        if options.singleflight {
            let lock_key = format!("lock:{}", key.wire());
            let outcome = self
                .guard
                .with_lock(&lock_key, || async {
                    // Double-check: the previous holder may have loaded it
                    if let Some(hit) = self.probe(key, options).await {
                        return Ok(hit);
                    }
                    self.load_via_origin(key, options, &loader).await
                })
                .await?;

            match outcome {
                GuardOutcome::Executed(result) => Ok(result),
                GuardOutcome::TimedOut => {
                    debug!(key = %key, "Singleflight wait timed out, loading unprotected");
                    self.load_via_origin(key, options, &loader).await
                }
            }
        } else {
            self.load_via_origin(key, options, &loader).await
        }
    }

    /// Write a value through both tiers (shared first)
    ///
    /// Used by the warmer and by mutations that refresh an entry in place.
    pub async fn put(&self, key: &CacheKey, value: &V, options: &LoadOptions) -> Result<()> {
        let encoded = self.codec.encode(value)?;
        self.l2
            .put(key, encoded, options.l2_ttl)
            .await
            .inspect_err(|_| self.metrics.tier_unavailable())?;
        if let Some(policy) = &options.l1 {
            let evicted = self.l1.put_with_policy(key, value.clone(), policy);
            self.record_evictions(evicted);
        }
        Ok(())
    }

    /// Remove a key from both tiers, L1 first
    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.l1.invalidate(key);
        self.l2
            .invalidate(key)
            .await
            .inspect_err(|_| self.metrics.tier_unavailable())
    }

    /// Remove every key of a namespace from both tiers, L1 first
    pub async fn invalidate_namespace(&self, namespace: &str) -> Result<u64> {
        let local = self.l1.invalidate_namespace(namespace);
        let shared = self
            .l2
            .invalidate_namespace(namespace)
            .await
            .inspect_err(|_| self.metrics.tier_unavailable())?;
        debug!(
            namespace = %namespace,
            l1_removed = local,
            l2_removed = shared,
            "Invalidated namespace"
        );
        Ok(shared)
    }

    /// In-process tier counters
    pub fn l1_stats(&self) -> LocalStatsSnapshot {
        self.l1.stats()
    }

    /// Reclaim expired L1 entries
    pub fn sweep_l1(&self) -> usize {
        self.l1.sweep()
    }

    /// Readiness of the shared tier
    pub async fn ping(&self) -> Result<()> {
        self.l2.ping().await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Probe L1 then L2; backfills L1 on an L2 hit. Tier and codec failures
    /// degrade to a miss.
    async fn probe(&self, key: &CacheKey, options: &LoadOptions) -> Option<LoadResult<V>> {
        if options.l1.is_some() {
            if let Some(value) = self.l1.get(key) {
                self.metrics.cache_hit(HitTier::L1);
                return Some(LoadResult::new(value, Source::L1));
            }
        }

        let raw = match self.l2.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Shared tier read failed, treating as miss");
                self.metrics.tier_unavailable();
                return None;
            }
        };

        match self.codec.decode(&raw) {
            Ok(value) => {
                if let Some(policy) = &options.l1 {
                    let evicted = self.l1.put_with_policy(key, value.clone(), policy);
                    self.record_evictions(evicted);
                }
                self.metrics.cache_hit(HitTier::L2);
                Some(LoadResult::new(value, Source::L2))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Undecodable shared-tier value, treating as miss");
                None
            }
        }
    }

    /// Invoke the loader and write the result through both tiers.
    /// Loader errors propagate and leave both tiers untouched.
    async fn load_via_origin<F, Fut>(
        &self,
        key: &CacheKey,
        options: &LoadOptions,
        loader: &F,
    ) -> Result<LoadResult<V>>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<V>> + Send,
    {
        let started = Instant::now();
        self.metrics.load_origin();
        let value = loader().await?;
        self.metrics.load_duration(started.elapsed());

        match self.codec.encode(&value) {
            Ok(encoded) => {
                if let Err(e) = self.l2.put(key, encoded, options.l2_ttl).await {
                    warn!(key = %key, error = %e, "Shared tier write skipped");
                    self.metrics.tier_unavailable();
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Encode failed, skipping cache write"),
        }
        if let Some(policy) = &options.l1 {
            let evicted = self.l1.put_with_policy(key, value.clone(), policy);
            self.record_evictions(evicted);
        }

        Ok(LoadResult::new(value, Source::Origin))
    }

    fn record_evictions(&self, count: usize) {
        for _ in 0..count {
            self.metrics.cache_eviction();
        }
    }
}
