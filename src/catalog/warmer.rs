//! Cache Warmer
//!
//! Pre-populates both tiers before the service starts taking traffic, and
//! again on demand after bulk imports. Each phase is timed and logged; a
//! failing phase is recorded and skipped, never fatal. Running the warmer
//! twice leaves the same cache contents as running it once.

use crate::cache::TwoLevel;
use crate::catalog::namespace::Namespace;
use crate::catalog::store::ProductStoreRef;
use crate::catalog::value::CatalogValue;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::metrics::MetricsRef;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of one warmer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmSummary {
    /// Products written into the by-id namespace
    pub products_warmed: usize,
    /// Categories in the warmed category list
    pub categories_warmed: usize,
    /// Per-category product lists written
    pub category_lists_warmed: usize,
    /// Length of the warmed new-arrivals list
    pub new_arrivals_warmed: usize,
    /// Phases that failed and were skipped
    pub failed_phases: usize,
    pub elapsed: Duration,
}

/// Startup/on-demand cache pre-population
pub struct CacheWarmer {
    store: ProductStoreRef,
    cache: Arc<TwoLevel<CatalogValue>>,
    config: CacheConfig,
    metrics: MetricsRef,
}

impl CacheWarmer {
    pub fn new(
        store: ProductStoreRef,
        cache: Arc<TwoLevel<CatalogValue>>,
        config: CacheConfig,
        metrics: MetricsRef,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            metrics,
        }
    }

    /// Run all four phases
    pub async fn run(&self) -> WarmSummary {
        info!("Cache warming started");
        let started = Instant::now();
        let mut summary = WarmSummary::default();

        match self.warm_top_products().await {
            Ok(count) => summary.products_warmed = count,
            Err(e) => {
                warn!(error = %e, "Top-products warm phase failed");
                summary.failed_phases += 1;
            }
        }

        match self.warm_categories().await {
            Ok((categories, lists)) => {
                summary.categories_warmed = categories;
                summary.category_lists_warmed = lists;
            }
            Err(e) => {
                warn!(error = %e, "Categories warm phase failed");
                summary.failed_phases += 1;
            }
        }

        match self.warm_new_arrivals().await {
            Ok(count) => summary.new_arrivals_warmed = count,
            Err(e) => {
                warn!(error = %e, "New-arrivals warm phase failed");
                summary.failed_phases += 1;
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            products = summary.products_warmed,
            categories = summary.categories_warmed,
            category_lists = summary.category_lists_warmed,
            new_arrivals = summary.new_arrivals_warmed,
            failed_phases = summary.failed_phases,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Cache warming finished"
        );
        summary
    }

    /// Phase 1: the first `top_n` active products into the by-id namespace
    async fn warm_top_products(&self) -> Result<usize> {
        let started = Instant::now();
        self.metrics.store_query();
        let mut products = self.store.find_active().await?;
        products.truncate(self.config.warmer.top_n);

        let options = Namespace::ProductById.load_options(&self.config);
        let mut warmed = 0;
        for product in products {
            let key = Namespace::ProductById.key(product.id.to_string());
            match self
                .cache
                .put(&key, &CatalogValue::Product(product), &options)
                .await
            {
                Ok(()) => warmed += 1,
                Err(e) => warn!(key = %key, error = %e, "Warm write skipped"),
            }
        }

        info!(
            warmed = warmed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Warmed top products"
        );
        Ok(warmed)
    }

    /// Phases 2 and 3: the category list, then one product list per category
    async fn warm_categories(&self) -> Result<(usize, usize)> {
        let started = Instant::now();
        self.metrics.store_query();
        let categories = self.store.find_distinct_categories().await?;

        let options = Namespace::Categories.load_options(&self.config);
        self.cache
            .put(
                &Namespace::Categories.key("all"),
                &CatalogValue::Categories(categories.clone()),
                &options,
            )
            .await?;

        let list_options = Namespace::Products.load_options(&self.config);
        let mut lists = 0;
        for category in &categories {
            self.metrics.store_query();
            let products = self.store.find_by_category(category).await?;
            let key = Namespace::Products.key(format!("category:{category}"));
            match self
                .cache
                .put(&key, &CatalogValue::ProductList(products), &list_options)
                .await
            {
                Ok(()) => lists += 1,
                Err(e) => warn!(key = %key, error = %e, "Warm write skipped"),
            }
        }

        info!(
            categories = categories.len(),
            lists = lists,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Warmed categories"
        );
        Ok((categories.len(), lists))
    }

    /// Phase 4: the new-arrivals list
    async fn warm_new_arrivals(&self) -> Result<usize> {
        let started = Instant::now();
        self.metrics.store_query();
        let products = self
            .store
            .find_top_n_by_recency(self.config.warmer.new_arrivals)
            .await?;
        let count = products.len();

        let options = Namespace::Products.load_options(&self.config);
        self.cache
            .put(
                &Namespace::Products.key("new"),
                &CatalogValue::ProductList(products),
                &options,
            )
            .await?;

        info!(
            warmed = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Warmed new arrivals"
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{JsonCodec, LocalCache, MemoryStore, SharedCache};
    use crate::catalog::product::Product;
    use crate::catalog::store::{MemoryProductStore, ProductStore};
    use crate::clock::ManualClock;
    use crate::config::LockConfig;
    use crate::lock::{MemoryLockStore, StampedeGuard};
    use crate::metrics::RecordingSink;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn product(name: &str, category: &str) -> Product {
        let now = Utc::now();
        Product {
            id: 0,
            name: name.into(),
            description: String::new(),
            price: dec!(10.00),
            stock_quantity: 1,
            category: category.into(),
            brand: "Acme".into(),
            image_url: String::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn warmer_fixture(
        top_n: usize,
    ) -> (CacheWarmer, Arc<TwoLevel<CatalogValue>>, Arc<MemoryProductStore>) {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryProductStore::new());

        for i in 0..5 {
            let category = if i < 3 { "shoes" } else { "tennis" };
            store
                .save(product(&format!("P{i}"), category))
                .await
                .unwrap();
        }

        let mut config = CacheConfig::default();
        config.warmer.top_n = top_n;

        let cache = Arc::new(TwoLevel::new(
            LocalCache::new(&config.l1, clock.clone()),
            SharedCache::new(
                Arc::new(MemoryStore::new(clock.clone())),
                config.l2.connect_timeout,
            ),
            Arc::new(JsonCodec::<CatalogValue>::new()),
            Arc::new(StampedeGuard::new(
                Arc::new(MemoryLockStore::new(clock.clone())),
                LockConfig::default(),
                sink.clone(),
            )),
            sink.clone(),
        ));

        let warmer = CacheWarmer::new(store.clone(), cache.clone(), config, sink);
        (warmer, cache, store)
    }

    #[tokio::test]
    async fn test_warm_populates_every_phase() {
        let (warmer, cache, _) = warmer_fixture(100).await;
        let summary = warmer.run().await;

        assert_eq!(summary.products_warmed, 5);
        assert_eq!(summary.categories_warmed, 2);
        assert_eq!(summary.category_lists_warmed, 2);
        assert_eq!(summary.new_arrivals_warmed, 5);
        assert_eq!(summary.failed_phases, 0);

        // 5 by-id + categories/all + 2 category lists + products/new in L1
        assert_eq!(cache.l1_stats().size, 9);
    }

    #[tokio::test]
    async fn test_warm_respects_top_n() {
        let (warmer, _, _) = warmer_fixture(2).await;
        let summary = warmer.run().await;
        assert_eq!(summary.products_warmed, 2);
    }

    #[tokio::test]
    async fn test_warm_twice_is_idempotent() {
        let (warmer, cache, _) = warmer_fixture(100).await;

        let first = warmer.run().await;
        let size_after_first = cache.l1_stats().size;

        let second = warmer.run().await;
        assert_eq!(second.products_warmed, first.products_warmed);
        assert_eq!(cache.l1_stats().size, size_after_first);
    }
}
