//! Stampede Guard
//!
//! Collapses concurrent loads of the same key into one execution,
//! cluster-wide. A caller acquires a mutual-exclusion lock bounded by a
//! lease; the lock store force-releases expired leases so a crashed holder
//! never wedges a key. Callers that cannot acquire within the wait window
//! fall through to an unprotected load, trading one extra origin hit for
//! availability.
//!
//! A lock moves through waiting, held, and then released (normal) or
//! lease-expired (forced). Release is always conditional on holder
//! identity; a slow holder must not evict a fresh acquirer's lock.

mod memory;
mod redis;

pub use memory::MemoryLockStore;
pub use redis::RedisLockStore;

use crate::config::LockConfig;
use crate::error::Result;
use crate::metrics::{LockOutcome, MetricsRef};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// =============================================================================
// LockStore Trait
// =============================================================================

/// Cluster-wide mutual-exclusion primitive
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Attempt a non-blocking acquisition of `key` for `holder`,
    /// leased for `lease`. Returns true when the lock was taken.
    async fn try_acquire(&self, key: &str, holder: &str, lease: Duration) -> Result<bool>;

    /// Release `key` iff it is still held by `holder`.
    /// Returns false when the lease already expired or another holder owns it.
    async fn release(&self, key: &str, holder: &str) -> Result<bool>;
}

/// Lock store handle
pub type LockStoreRef = Arc<dyn LockStore>;

// =============================================================================
// Guard Outcome
// =============================================================================

/// Result of a guarded section
#[derive(Debug)]
pub enum GuardOutcome<T> {
    /// The lock was held and the body ran to completion
    Executed(T),
    /// The wait window elapsed; the caller must fall through unprotected
    TimedOut,
}

impl<T> GuardOutcome<T> {
    pub fn executed(self) -> Option<T> {
        match self {
            GuardOutcome::Executed(value) => Some(value),
            GuardOutcome::TimedOut => None,
        }
    }
}

// =============================================================================
// Stampede Guard
// =============================================================================

/// Singleflight coordinator over a [`LockStore`]
pub struct StampedeGuard {
    store: LockStoreRef,
    config: LockConfig,
    metrics: MetricsRef,
    holder_seq: AtomicU64,
}

impl StampedeGuard {
    pub fn new(store: LockStoreRef, config: LockConfig, metrics: MetricsRef) -> Self {
        Self {
            store,
            config,
            metrics,
            holder_seq: AtomicU64::new(0),
        }
    }

    /// Process-unique holder nonce for one acquisition
    fn next_holder(&self) -> String {
        let seq = self.holder_seq.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}-{}-{}",
            std::process::id(),
            seq,
            chrono::Utc::now().timestamp_millis()
        )
    }

    /// Run `body` under the cluster-wide lock `lock_key`.
    ///
    /// Acquisition is retried until `wait_timeout` elapses; on timeout the
    /// caller receives [`GuardOutcome::TimedOut`] and must degrade to an
    /// unprotected load. The lock is released on every exit path, including
    /// cancellation of the returned future; a body that outlives its lease
    /// loses exclusivity and its release becomes a no-op.
    pub async fn with_lock<T, F, Fut>(&self, lock_key: &str, body: F) -> Result<GuardOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let holder = self.next_holder();
        let deadline = Instant::now() + self.config.wait_timeout;

        loop {
            match self
                .store
                .try_acquire(lock_key, &holder, self.config.lease_timeout)
                .await
            {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) if e.is_degradable() => {
                    // Lock store down: behave like a wait timeout rather
                    // than failing the read path.
                    warn!(key = %lock_key, error = %e, "Lock store unavailable, degrading");
                    self.metrics.lock_acquire(LockOutcome::Timeout);
                    return Ok(GuardOutcome::TimedOut);
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                debug!(key = %lock_key, "Lock wait timed out");
                self.metrics.lock_acquire(LockOutcome::Timeout);
                return Ok(GuardOutcome::TimedOut);
            }
            tokio::time::sleep(self.config.retry_interval).await;
        }

        self.metrics.lock_acquire(LockOutcome::Acquired);
        debug!(key = %lock_key, holder = %holder, "Lock acquired");
        let held_from = Instant::now();

        let mut release_guard = ReleaseGuard::armed(self.store.clone(), lock_key, &holder);
        let result = body().await;
        release_guard.disarm();

        match self.store.release(lock_key, &holder).await {
            Ok(true) => debug!(key = %lock_key, "Lock released"),
            Ok(false) => warn!(key = %lock_key, "Lease expired before release"),
            Err(e) => warn!(key = %lock_key, error = %e, "Lock release failed"),
        }
        self.metrics.lock_hold(held_from.elapsed());

        result.map(GuardOutcome::Executed)
    }
}

// =============================================================================
// Release Guard
// =============================================================================

/// Releases the lock from `Drop` if the guarded future is cancelled mid-body
struct ReleaseGuard {
    store: LockStoreRef,
    key: String,
    holder: String,
    armed: bool,
}

impl ReleaseGuard {
    fn armed(store: LockStoreRef, key: &str, holder: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
            holder: holder.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let holder = std::mem::take(&mut self.holder);
        // Detached conditional release; the lease bounds the worst case
        // if no runtime is available to run it.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = store.release(&key, &holder).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use crate::metrics::RecordingSink;
    use std::sync::atomic::AtomicU32;

    fn guard_with(config: LockConfig) -> (StampedeGuard, Arc<RecordingSink>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryLockStore::new(clock.clone()));
        let sink = Arc::new(RecordingSink::new());
        (
            StampedeGuard::new(store, config, sink.clone()),
            sink,
            clock,
        )
    }

    fn fast_config() -> LockConfig {
        LockConfig {
            wait_timeout: Duration::from_millis(200),
            lease_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_body_runs_under_lock() {
        let (guard, sink, _) = guard_with(fast_config());

        let outcome = guard
            .with_lock("lock:productById::1", || async { Ok(41 + 1) })
            .await
            .unwrap();

        assert_eq!(outcome.executed(), Some(42));
        assert_eq!(sink.snapshot().locks_acquired, 1);
        assert_eq!(sink.snapshot().lock_timeouts, 0);
    }

    #[tokio::test]
    async fn test_body_error_still_releases() {
        let (guard, _, _) = guard_with(fast_config());

        let first: Result<GuardOutcome<()>> = guard
            .with_lock("lock:k", || async {
                Err(Error::StoreUnavailable("db down".into()))
            })
            .await;
        assert!(first.is_err());

        // The lock must be free again for the next caller
        let second = guard.with_lock("lock:k", || async { Ok(()) }).await.unwrap();
        assert!(matches!(second, GuardOutcome::Executed(())));
    }

    #[tokio::test]
    async fn test_contention_serializes_to_one_execution_at_a_time() {
        let config = LockConfig {
            wait_timeout: Duration::from_secs(2),
            lease_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(5),
        };
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryLockStore::new(clock));
        let sink = Arc::new(RecordingSink::new());
        let guard = Arc::new(StampedeGuard::new(store, config, sink));

        let in_flight = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let guard = guard.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                guard
                    .with_lock("lock:hot", || async {
                        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(current, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_timeout_reports_timed_out() {
        let (guard, sink, _) = guard_with(fast_config());
        let guard = Arc::new(guard);

        // Occupy the lock past the other caller's wait window
        let holder = guard.clone();
        let blocker = tokio::spawn(async move {
            holder
                .with_lock("lock:slow", || async {
                    tokio::time::sleep(Duration::from_millis(400)).await;
                    Ok(())
                })
                .await
                .unwrap()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let outcome: GuardOutcome<()> = guard.with_lock("lock:slow", || async { Ok(()) }).await.unwrap();
        assert!(matches!(outcome, GuardOutcome::TimedOut));
        assert_eq!(sink.snapshot().lock_timeouts, 1);

        blocker.await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_reacquired() {
        let (guard, _, clock) = guard_with(LockConfig {
            wait_timeout: Duration::from_millis(100),
            lease_timeout: Duration::from_millis(50),
            retry_interval: Duration::from_millis(5),
        });
        let guard = Arc::new(guard);

        // First holder acquires, then its lease lapses on the manual clock
        let store_view = guard.clone();
        let outcome = store_view
            .with_lock("lock:leased", || async {
                clock.advance(Duration::from_millis(100));
                // While the body is still running, a second acquisition succeeds
                let second: GuardOutcome<()> =
                    guard.with_lock("lock:leased", || async { Ok(()) }).await.unwrap();
                assert!(matches!(second, GuardOutcome::Executed(())));
                Ok(())
            })
            .await
            .unwrap();
        assert!(matches!(outcome, GuardOutcome::Executed(())));
    }
}
