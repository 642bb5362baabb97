//! Cache Namespaces
//!
//! The closed set of cache partitions and the TTL policy bound to each.
//! Stable data lives long (categories), volatile data lives short (search
//! results, price ranges). The in-process TTL for a namespace is always
//! clamped to its shared-tier TTL so L1 can never outlive L2.

use crate::cache::key::CacheKey;
use crate::cache::{L1TtlPolicy, LoadOptions};
use crate::config::CacheConfig;
use std::fmt;
use std::time::Duration;

/// In-process TTL for search results, which churn too fast for the default
const SEARCH_L1_TTL: Duration = Duration::from_secs(60);

/// Logical cache partition with its own TTL policy and invalidation scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Individual products by id
    ProductById,
    /// Product lists: all, per category, new arrivals
    Products,
    /// The distinct category list
    Categories,
    /// Keyword search results
    SearchResults,
    /// Price-range query results
    PriceRange,
}

impl Namespace {
    /// Every namespace, in invalidation-walk order
    pub const ALL: [Namespace; 5] = [
        Namespace::ProductById,
        Namespace::Products,
        Namespace::Categories,
        Namespace::SearchResults,
        Namespace::PriceRange,
    ];

    /// Wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::ProductById => "productById",
            Namespace::Products => "products",
            Namespace::Categories => "categories",
            Namespace::SearchResults => "searchResults",
            Namespace::PriceRange => "priceRange",
        }
    }

    /// Shared-tier TTL when no override is configured
    pub fn default_l2_ttl(&self) -> Option<Duration> {
        let ttl = match self {
            Namespace::ProductById => Duration::from_secs(15 * 60),
            Namespace::Products => Duration::from_secs(10 * 60),
            Namespace::Categories => Duration::from_secs(60 * 60),
            Namespace::SearchResults => Duration::from_secs(5 * 60),
            Namespace::PriceRange => Duration::from_secs(3 * 60),
        };
        Some(ttl)
    }

    /// In-process policy before clamping; `None` keeps the namespace out
    /// of L1 entirely.
    fn l1_policy(&self, config: &CacheConfig) -> Option<L1TtlPolicy> {
        match self {
            Namespace::ProductById | Namespace::Products | Namespace::Categories => {
                Some(L1TtlPolicy {
                    ttl_write: config.l1.ttl_write,
                    ttl_access: config.l1.ttl_access,
                })
            }
            Namespace::SearchResults => Some(L1TtlPolicy {
                ttl_write: SEARCH_L1_TTL,
                ttl_access: None,
            }),
            Namespace::PriceRange => None,
        }
    }

    /// Build the composite's per-lookup options for this namespace.
    ///
    /// The L1 write TTL is clamped to the L2 TTL, so an entry in the
    /// unshared tier is always at least as fresh as the shared one.
    pub fn load_options(&self, config: &CacheConfig) -> LoadOptions {
        let l2_ttl = config.l2.ttl_for(*self);
        let l1 = self.l1_policy(config).map(|mut policy| {
            policy.ttl_write = policy.ttl_write.min(l2_ttl);
            policy
        });
        LoadOptions {
            l1,
            l2_ttl,
            singleflight: false,
        }
    }

    /// Key for an id within this namespace
    pub fn key(&self, id: impl Into<String>) -> CacheKey {
        CacheKey::new(self.as_str(), id)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_identifiers() {
        assert_eq!(Namespace::ProductById.as_str(), "productById");
        assert_eq!(Namespace::SearchResults.as_str(), "searchResults");
        assert_eq!(Namespace::ProductById.key("42").wire(), "productById::42");
    }

    #[test]
    fn test_ttl_table() {
        assert_eq!(
            Namespace::ProductById.default_l2_ttl(),
            Some(Duration::from_secs(900))
        );
        assert_eq!(
            Namespace::Categories.default_l2_ttl(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            Namespace::PriceRange.default_l2_ttl(),
            Some(Duration::from_secs(180))
        );
    }

    #[test]
    fn test_l1_membership() {
        let config = CacheConfig::default();

        assert!(Namespace::ProductById.load_options(&config).l1.is_some());
        assert!(Namespace::Products.load_options(&config).l1.is_some());
        assert!(Namespace::Categories.load_options(&config).l1.is_some());
        assert!(Namespace::PriceRange.load_options(&config).l1.is_none());

        let search = Namespace::SearchResults.load_options(&config).l1.unwrap();
        assert_eq!(search.ttl_write, Duration::from_secs(60));
        assert_eq!(search.ttl_access, None);
    }

    #[test]
    fn test_l1_ttl_clamped_to_l2() {
        let mut config = CacheConfig::default();
        config
            .l2
            .ttl_overrides
            .insert(Namespace::ProductById, Duration::from_millis(100));

        let options = Namespace::ProductById.load_options(&config);
        assert_eq!(options.l2_ttl, Duration::from_millis(100));
        assert_eq!(options.l1.unwrap().ttl_write, Duration::from_millis(100));
    }
}
