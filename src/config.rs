//! Configuration
//!
//! The knob surface of the caching core. Every field has a production
//! default; the binary overrides them from CLI flags and environment
//! variables.

use crate::catalog::Namespace;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// Configuration for the full caching core
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// In-process tier (C1)
    pub l1: L1Config,
    /// Shared tier (C2)
    pub l2: L2Config,
    /// Stampede guard (C4)
    pub lock: LockConfig,
    /// Startup warmer
    pub warmer: WarmerConfig,
}

// =============================================================================
// L1 Configuration
// =============================================================================

/// Configuration for the in-process cache tier
#[derive(Debug, Clone)]
pub struct L1Config {
    /// Maximum number of entries across all shards (>= 1); the budget is
    /// split evenly per shard
    pub max_size: usize,
    /// Absolute entry lifetime
    pub ttl_write: Duration,
    /// Idle lifetime; `None` disables idle expiry
    pub ttl_access: Option<Duration>,
    /// Number of lock shards (clamped to 1..=max_size)
    pub shard_count: usize,
    /// Period of the background sweep reclaiming expired entries
    pub sweep_interval: Duration,
}

impl Default for L1Config {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            ttl_write: Duration::from_secs(5 * 60),
            ttl_access: Some(Duration::from_secs(3 * 60)),
            shard_count: 16,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// L2 Configuration
// =============================================================================

/// Configuration for the shared cache tier
#[derive(Debug, Clone)]
pub struct L2Config {
    /// Connection string for the shared store
    pub url: String,
    /// TTL applied when a namespace has no override
    pub default_ttl: Duration,
    /// Per-namespace TTL overrides
    pub ttl_overrides: HashMap<Namespace, Duration>,
    /// Per-operation network timeout
    pub connect_timeout: Duration,
    /// Connections established eagerly at startup
    pub pool_min_idle: usize,
    /// Maximum pool size
    pub pool_max_size: usize,
}

impl Default for L2Config {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            default_ttl: Duration::from_secs(10 * 60),
            ttl_overrides: HashMap::new(),
            connect_timeout: Duration::from_secs(3),
            pool_min_idle: 10,
            pool_max_size: 50,
        }
    }
}

impl L2Config {
    /// Effective TTL for a namespace: explicit override, then the
    /// namespace's policy default, then `default_ttl`.
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        self.ttl_overrides
            .get(&namespace)
            .copied()
            .or_else(|| namespace.default_l2_ttl())
            .unwrap_or(self.default_ttl)
    }
}

// =============================================================================
// Lock Configuration
// =============================================================================

/// Configuration for the stampede guard
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long a caller waits to acquire before falling through
    pub wait_timeout: Duration,
    /// Lease after which the store force-releases a held lock
    pub lease_timeout: Duration,
    /// Delay between acquisition attempts while waiting
    pub retry_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(5),
            lease_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(100),
        }
    }
}

// =============================================================================
// Warmer Configuration
// =============================================================================

/// Configuration for the startup warmer
#[derive(Debug, Clone)]
pub struct WarmerConfig {
    /// Products preloaded into the by-id namespace
    pub top_n: usize,
    /// Size of the new-arrivals list
    pub new_arrivals: usize,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            top_n: 100,
            new_arrivals: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = CacheConfig::default();
        assert_eq!(config.l1.max_size, 10_000);
        assert_eq!(config.l1.ttl_write, Duration::from_secs(300));
        assert_eq!(config.l1.ttl_access, Some(Duration::from_secs(180)));
        assert_eq!(config.l2.default_ttl, Duration::from_secs(600));
        assert_eq!(config.l2.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.l2.pool_min_idle, 10);
        assert_eq!(config.l2.pool_max_size, 50);
        assert_eq!(config.lock.wait_timeout, Duration::from_secs(5));
        assert_eq!(config.lock.lease_timeout, Duration::from_secs(10));
        assert_eq!(config.warmer.top_n, 100);
    }

    #[test]
    fn test_ttl_override_wins() {
        let mut config = L2Config::default();
        assert_eq!(config.ttl_for(Namespace::ProductById), Duration::from_secs(15 * 60));

        config
            .ttl_overrides
            .insert(Namespace::ProductById, Duration::from_millis(100));
        assert_eq!(config.ttl_for(Namespace::ProductById), Duration::from_millis(100));
    }
}
