//! Product Service
//!
//! The domain-facing surface of the caching core. Every read is
//! read-through over the two-level cache under its namespace policy; every
//! mutation commits to the store first and then runs its invalidation set.
//! Invalidation failures after a committed write are logged and metered,
//! never surfaced: TTL converges the tiers eventually.

use crate::cache::{LoadOptions, LoadResult, Source, TwoLevel};
use crate::catalog::namespace::Namespace;
use crate::catalog::product::Product;
use crate::catalog::store::ProductStoreRef;
use crate::catalog::value::CatalogValue;
use crate::catalog::warmer::{CacheWarmer, WarmSummary};
use crate::clock::ClockRef;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::metrics::MetricsRef;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Catalog reads and mutations bound to the cache policy table
pub struct ProductService {
    store: ProductStoreRef,
    cache: Arc<TwoLevel<CatalogValue>>,
    config: CacheConfig,
    clock: ClockRef,
    metrics: MetricsRef,
    warmer: CacheWarmer,
    /// While set, reads bypass the caches and go straight to the store
    warming: AtomicBool,
}

impl ProductService {
    pub fn new(
        store: ProductStoreRef,
        cache: Arc<TwoLevel<CatalogValue>>,
        config: CacheConfig,
        clock: ClockRef,
        metrics: MetricsRef,
    ) -> Self {
        let warmer = CacheWarmer::new(
            store.clone(),
            cache.clone(),
            config.clone(),
            metrics.clone(),
        );
        Self {
            store,
            cache,
            config,
            clock,
            metrics,
            warmer,
            warming: AtomicBool::new(false),
        }
    }

    fn options(&self, namespace: Namespace) -> LoadOptions {
        namespace.load_options(&self.config)
    }

    fn warming_active(&self) -> bool {
        self.warming.load(Ordering::Acquire)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch a product by id through the cache
    pub async fn get_by_id(&self, id: i64) -> Result<LoadResult<Product>> {
        self.get_by_id_inner(id, false).await
    }

    /// Fetch a product by id with stampede protection on the loader
    pub async fn get_by_id_guarded(&self, id: i64) -> Result<LoadResult<Product>> {
        self.get_by_id_inner(id, true).await
    }

    async fn get_by_id_inner(&self, id: i64, singleflight: bool) -> Result<LoadResult<Product>> {
        if id <= 0 {
            return Err(Error::InvalidInput(format!("product id must be positive, got {id}")));
        }
        if self.warming_active() {
            let value = self.load_product(id).await?;
            return Ok(LoadResult::new(value.into_product()?, Source::Origin));
        }

        let key = Namespace::ProductById.key(id.to_string());
        let options = self.options(Namespace::ProductById).with_singleflight(singleflight);
        self.cache
            .get_or_load(&key, &options, || self.load_product(id))
            .await?
            .try_map(CatalogValue::into_product)
    }

    /// All active products
    pub async fn get_all(&self) -> Result<LoadResult<Vec<Product>>> {
        if self.warming_active() {
            let value = self.load_all().await?;
            return Ok(LoadResult::new(value.into_product_list()?, Source::Origin));
        }
        let key = Namespace::Products.key("all");
        self.cache
            .get_or_load(&key, &self.options(Namespace::Products), || self.load_all())
            .await?
            .try_map(CatalogValue::into_product_list)
    }

    /// Active products of one category
    pub async fn get_by_category(&self, category: &str) -> Result<LoadResult<Vec<Product>>> {
        if category.trim().is_empty() {
            return Err(Error::InvalidInput("category must not be empty".into()));
        }
        if self.warming_active() {
            let value = self.load_category(category).await?;
            return Ok(LoadResult::new(value.into_product_list()?, Source::Origin));
        }
        let key = Namespace::Products.key(format!("category:{category}"));
        self.cache
            .get_or_load(&key, &self.options(Namespace::Products), || {
                self.load_category(category)
            })
            .await?
            .try_map(CatalogValue::into_product_list)
    }

    /// The most recently created products
    pub async fn get_new_arrivals(&self) -> Result<LoadResult<Vec<Product>>> {
        if self.warming_active() {
            let value = self.load_new_arrivals().await?;
            return Ok(LoadResult::new(value.into_product_list()?, Source::Origin));
        }
        let key = Namespace::Products.key("new");
        self.cache
            .get_or_load(&key, &self.options(Namespace::Products), || {
                self.load_new_arrivals()
            })
            .await?
            .try_map(CatalogValue::into_product_list)
    }

    /// Substring search against the store
    pub async fn search(&self, keyword: &str) -> Result<LoadResult<Vec<Product>>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(Error::InvalidInput("search keyword must not be empty".into()));
        }
        if self.warming_active() {
            let value = self.load_search(keyword).await?;
            return Ok(LoadResult::new(value.into_product_list()?, Source::Origin));
        }
        let key = Namespace::SearchResults.key(keyword.to_lowercase());
        self.cache
            .get_or_load(&key, &self.options(Namespace::SearchResults), || {
                self.load_search(keyword)
            })
            .await?
            .try_map(CatalogValue::into_product_list)
    }

    /// Active products priced within `[min, max]`
    pub async fn get_by_price_range(
        &self,
        min: Decimal,
        max: Decimal,
    ) -> Result<LoadResult<Vec<Product>>> {
        if min < Decimal::ZERO || min > max {
            return Err(Error::InvalidInput(format!(
                "invalid price range: {min} - {max}"
            )));
        }
        if self.warming_active() {
            let value = self.load_price_range(min, max).await?;
            return Ok(LoadResult::new(value.into_product_list()?, Source::Origin));
        }
        let key = Namespace::PriceRange.key(format!("price:{min}-{max}"));
        self.cache
            .get_or_load(&key, &self.options(Namespace::PriceRange), || {
                self.load_price_range(min, max)
            })
            .await?
            .try_map(CatalogValue::into_product_list)
    }

    /// Distinct categories of active products
    pub async fn get_categories(&self) -> Result<LoadResult<Vec<String>>> {
        if self.warming_active() {
            let value = self.load_categories().await?;
            return Ok(LoadResult::new(value.into_categories()?, Source::Origin));
        }
        let key = Namespace::Categories.key("all");
        self.cache
            .get_or_load(&key, &self.options(Namespace::Categories), || {
                self.load_categories()
            })
            .await?
            .try_map(CatalogValue::into_categories)
    }

    // =========================================================================
    // Loaders
    // =========================================================================

    async fn load_product(&self, id: i64) -> Result<CatalogValue> {
        self.metrics.store_query();
        let product = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(Error::NotFound { id })?;
        Ok(CatalogValue::Product(product))
    }

    async fn load_all(&self) -> Result<CatalogValue> {
        self.metrics.store_query();
        Ok(CatalogValue::ProductList(self.store.find_active().await?))
    }

    async fn load_category(&self, category: &str) -> Result<CatalogValue> {
        self.metrics.store_query();
        Ok(CatalogValue::ProductList(
            self.store.find_by_category(category).await?,
        ))
    }

    async fn load_new_arrivals(&self) -> Result<CatalogValue> {
        self.metrics.store_query();
        Ok(CatalogValue::ProductList(
            self.store
                .find_top_n_by_recency(self.config.warmer.new_arrivals)
                .await?,
        ))
    }

    async fn load_search(&self, keyword: &str) -> Result<CatalogValue> {
        self.metrics.store_query();
        Ok(CatalogValue::ProductList(
            self.store.search_products(keyword).await?,
        ))
    }

    async fn load_price_range(&self, min: Decimal, max: Decimal) -> Result<CatalogValue> {
        self.metrics.store_query();
        Ok(CatalogValue::ProductList(
            self.store.find_by_price_range(min, max).await?,
        ))
    }

    async fn load_categories(&self) -> Result<CatalogValue> {
        self.metrics.store_query();
        Ok(CatalogValue::Categories(
            self.store.find_distinct_categories().await?,
        ))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a product, then drop every list the new row may appear in
    pub async fn create(&self, mut product: Product) -> Result<Product> {
        validate(&product)?;
        let now = self.clock.now();
        product.id = 0;
        product.created_at = now;
        product.updated_at = now;

        self.metrics.store_query();
        let saved = self.store.save(product).await?;
        info!(id = saved.id, name = %saved.name, "Created product");

        self.invalidate_namespaces(&[
            Namespace::Products,
            Namespace::Categories,
            Namespace::PriceRange,
        ])
        .await;
        Ok(saved)
    }

    /// Update a product, refresh its by-id entry in both tiers, and drop
    /// the lists its old or new state may appear in
    pub async fn update(&self, id: i64, changes: Product) -> Result<Product> {
        if id <= 0 {
            return Err(Error::InvalidInput(format!("product id must be positive, got {id}")));
        }
        validate(&changes)?;

        self.metrics.store_query();
        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(Error::NotFound { id })?;

        let updated = Product {
            id,
            created_at: current.created_at,
            updated_at: self.clock.now(),
            ..changes
        };
        self.metrics.store_query();
        let saved = self.store.save(updated).await?;
        info!(id = saved.id, "Updated product");

        // Cache-put so both tiers serve the new value immediately
        let key = Namespace::ProductById.key(id.to_string());
        let options = self.options(Namespace::ProductById);
        if let Err(e) = self
            .cache
            .put(&key, &CatalogValue::Product(saved.clone()), &options)
            .await
        {
            warn!(id = id, error = %e, "Cache refresh after update failed");
        }

        self.invalidate_namespaces(&[Namespace::Products, Namespace::PriceRange])
            .await;
        Ok(saved)
    }

    /// Delete a product and every cached view that may contain it
    pub async fn delete(&self, id: i64) -> Result<()> {
        if id <= 0 {
            return Err(Error::InvalidInput(format!("product id must be positive, got {id}")));
        }

        self.metrics.store_query();
        if !self.store.delete_by_id(id).await? {
            return Err(Error::NotFound { id });
        }
        info!(id = id, "Deleted product");

        let key = Namespace::ProductById.key(id.to_string());
        if let Err(e) = self.cache.invalidate(&key).await {
            warn!(id = id, error = %e, "By-id invalidation failed");
        }
        self.invalidate_namespaces(&[
            Namespace::Products,
            Namespace::PriceRange,
            Namespace::SearchResults,
        ])
        .await;
        Ok(())
    }

    async fn invalidate_namespaces(&self, namespaces: &[Namespace]) {
        for namespace in namespaces {
            if let Err(e) = self.cache.invalidate_namespace(namespace.as_str()).await {
                warn!(namespace = %namespace, error = %e, "Namespace invalidation failed");
            }
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Pre-populate both tiers; reads degrade to direct store access while
    /// this runs. Safe to invoke again after a bulk import.
    pub async fn warm(&self) -> WarmSummary {
        self.warming.store(true, Ordering::Release);
        let summary = self.warmer.run().await;
        self.warming.store(false, Ordering::Release);
        summary
    }

    /// Drop every namespace from both tiers
    pub async fn clear_all_caches(&self) {
        for namespace in Namespace::ALL {
            if let Err(e) = self.cache.invalidate_namespace(namespace.as_str()).await {
                warn!(namespace = %namespace, error = %e, "Cache clear failed");
            }
        }
        info!("All caches cleared");
    }

    /// In-process tier counters
    pub fn cache_stats(&self) -> crate::cache::LocalStatsSnapshot {
        self.cache.l1_stats()
    }

    /// Reclaim expired L1 entries; returns the number removed
    pub fn sweep_l1(&self) -> usize {
        self.cache.sweep_l1()
    }

    /// Readiness of the shared tier
    pub async fn ping_shared_tier(&self) -> Result<()> {
        self.cache.ping().await
    }
}

fn validate(product: &Product) -> Result<()> {
    if product.name.trim().is_empty() {
        return Err(Error::InvalidInput("product name must not be empty".into()));
    }
    if product.price < Decimal::ZERO {
        return Err(Error::InvalidInput(format!(
            "product price must not be negative, got {}",
            product.price
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{JsonCodec, LocalCache, MemoryStore, SharedCache};
    use crate::catalog::store::{MemoryProductStore, ProductStore};
    use crate::clock::ManualClock;
    use crate::config::{L1Config, LockConfig};
    use crate::lock::{MemoryLockStore, StampedeGuard};
    use crate::metrics::RecordingSink;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn sample(name: &str, category: &str, price: Decimal) -> Product {
        let now = Utc::now();
        Product {
            id: 0,
            name: name.into(),
            description: format!("{name} description"),
            price,
            stock_quantity: 3,
            category: category.into(),
            brand: "Acme".into(),
            image_url: String::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    struct Harness {
        service: ProductService,
        sink: Arc<RecordingSink>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryProductStore::new());
        let (service, sink, _clock) = harness_over(store);
        Harness { service, sink }
    }

    fn harness_over(
        store: Arc<dyn ProductStore>,
    ) -> (ProductService, Arc<RecordingSink>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(RecordingSink::new());
        let config = CacheConfig::default();

        let l1 = LocalCache::new(
            &L1Config {
                shard_count: 1,
                ..config.l1.clone()
            },
            clock.clone(),
        );
        let l2 = SharedCache::new(
            Arc::new(MemoryStore::new(clock.clone())),
            config.l2.connect_timeout,
        );
        let guard = Arc::new(StampedeGuard::new(
            Arc::new(MemoryLockStore::new(clock.clone())),
            LockConfig {
                retry_interval: Duration::from_millis(5),
                ..config.lock.clone()
            },
            sink.clone(),
        ));
        let cache = Arc::new(TwoLevel::new(
            l1,
            l2,
            Arc::new(JsonCodec::<CatalogValue>::new()),
            guard,
            sink.clone(),
        ));
        let service = ProductService::new(store, cache, config, clock.clone(), sink.clone());
        (service, sink, clock)
    }

    #[tokio::test]
    async fn test_invalid_inputs_never_reach_the_cache() {
        let h = harness();

        assert!(matches!(
            h.service.get_by_id(0).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            h.service.search("   ").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            h.service.get_by_category("").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            h.service.get_by_price_range(dec!(100), dec!(10)).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            h.service.get_by_price_range(dec!(-1), dec!(10)).await,
            Err(Error::InvalidInput(_))
        ));

        assert_eq!(h.sink.snapshot().store_queries, 0);
        assert_eq!(h.service.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found_and_not_cached() {
        let h = harness();

        assert!(matches!(
            h.service.get_by_id(99).await,
            Err(Error::NotFound { id: 99 })
        ));
        // Second call queries the store again: absence was not cached
        assert!(matches!(
            h.service.get_by_id(99).await,
            Err(Error::NotFound { id: 99 })
        ));
        assert_eq!(h.sink.snapshot().store_queries, 2);
    }

    #[tokio::test]
    async fn test_read_paths_cache_under_their_namespaces() {
        let h = harness();
        h.service.create(sample("Trail Runner", "shoes", dec!(89.99))).await.unwrap();

        let by_cat = h.service.get_by_category("shoes").await.unwrap();
        assert_eq!(by_cat.source, Source::Origin);
        let again = h.service.get_by_category("shoes").await.unwrap();
        assert_eq!(again.source, Source::L1);

        let search = h.service.search("TRAIL").await.unwrap();
        assert_eq!(search.source, Source::Origin);
        assert_eq!(search.value.len(), 1);
        let search_again = h.service.search("TRAIL").await.unwrap();
        assert_eq!(search_again.source, Source::L1);

        // Price range stays out of L1 and hits the shared tier instead
        let range = h.service.get_by_price_range(dec!(0), dec!(100)).await.unwrap();
        assert_eq!(range.source, Source::Origin);
        let range_again = h.service.get_by_price_range(dec!(0), dec!(100)).await.unwrap();
        assert_eq!(range_again.source, Source::L2);
    }

    #[tokio::test]
    async fn test_create_invalidates_list_namespaces() {
        let h = harness();
        h.service.create(sample("Trail Runner", "shoes", dec!(89.99))).await.unwrap();

        // Prime the list caches
        assert_eq!(h.service.get_all().await.unwrap().value.len(), 1);
        assert_eq!(h.service.get_categories().await.unwrap().value, vec!["shoes"]);

        h.service.create(sample("Court Racket", "tennis", dec!(120))).await.unwrap();

        // Both lists reflect the new row immediately
        let all = h.service.get_all().await.unwrap();
        assert_eq!(all.source, Source::Origin);
        assert_eq!(all.value.len(), 2);
        let categories = h.service.get_categories().await.unwrap();
        assert_eq!(categories.source, Source::Origin);
        assert_eq!(categories.value, vec!["shoes", "tennis"]);
    }

    #[tokio::test]
    async fn test_update_refreshes_by_id_without_a_reload() {
        let h = harness();
        let created = h
            .service
            .create(sample("Trail Runner", "shoes", dec!(89.99)))
            .await
            .unwrap();

        // Prime the by-id entry
        assert_eq!(
            h.service.get_by_id(created.id).await.unwrap().source,
            Source::Origin
        );

        let mut changes = created.clone();
        changes.price = dec!(79.99);
        let updated = h.service.update(created.id, changes).await.unwrap();
        assert_eq!(updated.price, dec!(79.99));
        assert_eq!(updated.created_at, created.created_at);

        let queries_before = h.sink.snapshot().store_queries;
        let read = h.service.get_by_id(created.id).await.unwrap();
        assert_eq!(read.value.price, dec!(79.99));
        assert_eq!(read.source, Source::L1);
        // The cache-put made a reload unnecessary
        assert_eq!(h.sink.snapshot().store_queries, queries_before);
    }

    #[tokio::test]
    async fn test_delete_clears_by_id_and_search() {
        let h = harness();
        let created = h
            .service
            .create(sample("Trail Runner", "shoes", dec!(89.99)))
            .await
            .unwrap();

        h.service.get_by_id(created.id).await.unwrap();
        h.service.search("trail").await.unwrap();

        h.service.delete(created.id).await.unwrap();

        assert!(matches!(
            h.service.get_by_id(created.id).await,
            Err(Error::NotFound { .. })
        ));
        let hits = h.service.search("trail").await.unwrap();
        assert_eq!(hits.source, Source::Origin);
        assert!(hits.value.is_empty());

        assert!(matches!(
            h.service.delete(created.id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_all_caches_drops_every_namespace() {
        let h = harness();
        h.service.create(sample("Trail Runner", "shoes", dec!(89.99))).await.unwrap();
        h.service.get_all().await.unwrap();
        h.service.get_categories().await.unwrap();
        h.service.get_by_id(1).await.unwrap();

        h.service.clear_all_caches().await;

        assert_eq!(h.service.cache_stats().size, 0);
        assert_eq!(h.service.get_by_id(1).await.unwrap().source, Source::Origin);
    }

    #[tokio::test]
    async fn test_guarded_get_serves_the_same_value() {
        let h = harness();
        let created = h
            .service
            .create(sample("Trail Runner", "shoes", dec!(89.99)))
            .await
            .unwrap();

        let first = h.service.get_by_id_guarded(created.id).await.unwrap();
        assert_eq!(first.source, Source::Origin);
        assert_eq!(h.sink.snapshot().locks_acquired, 1);

        let second = h.service.get_by_id_guarded(created.id).await.unwrap();
        assert_eq!(second.source, Source::L1);
        // A cache hit never touches the lock
        assert_eq!(h.sink.snapshot().locks_acquired, 1);
    }

    // =========================================================================
    // Warming degradation
    // =========================================================================

    /// Store whose `find_active` blocks until released, so a test can hold
    /// the service in its warming phase.
    struct GatedStore {
        inner: MemoryProductStore,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ProductStore for GatedStore {
        async fn find_by_id(&self, id: i64) -> Result<Option<Product>> {
            self.inner.find_by_id(id).await
        }
        async fn find_active(&self) -> Result<Vec<Product>> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.find_active().await
        }
        async fn find_by_category(&self, category: &str) -> Result<Vec<Product>> {
            self.inner.find_by_category(category).await
        }
        async fn find_by_price_range(&self, min: Decimal, max: Decimal) -> Result<Vec<Product>> {
            self.inner.find_by_price_range(min, max).await
        }
        async fn search_products(&self, keyword: &str) -> Result<Vec<Product>> {
            self.inner.search_products(keyword).await
        }
        async fn find_distinct_categories(&self) -> Result<Vec<String>> {
            self.inner.find_distinct_categories().await
        }
        async fn find_top_n_by_recency(&self, n: usize) -> Result<Vec<Product>> {
            self.inner.find_top_n_by_recency(n).await
        }
        async fn save(&self, product: Product) -> Result<Product> {
            self.inner.save(product).await
        }
        async fn delete_by_id(&self, id: i64) -> Result<bool> {
            self.inner.delete_by_id(id).await
        }
    }

    #[tokio::test]
    async fn test_reads_bypass_caches_while_warming() {
        let gated = Arc::new(GatedStore {
            inner: MemoryProductStore::new(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        gated
            .inner
            .save(sample("Trail Runner", "shoes", dec!(89.99)))
            .await
            .unwrap();

        let (service, _, _) = harness_over(gated.clone());
        let service = Arc::new(service);

        let warm_task = {
            let service = service.clone();
            tokio::spawn(async move { service.warm().await })
        };

        // Wait until the warmer is inside its first phase
        gated.entered.notified().await;

        // Reads degrade to direct store access and leave the caches alone
        let read = service.get_by_id(1).await.unwrap();
        assert_eq!(read.source, Source::Origin);
        assert_eq!(service.cache_stats().size, 0);

        gated.release.notify_one();
        let summary = warm_task.await.unwrap();
        assert_eq!(summary.products_warmed, 1);

        // Warming over: the warmed entry now serves from L1
        let read = service.get_by_id(1).await.unwrap();
        assert_eq!(read.source, Source::L1);
    }
}
