//! Product Store Port
//!
//! The relational store behind the cache, seen through a narrow trait.
//! Retries live inside implementations; the core only distinguishes
//! "answered" from [`crate::error::Error::StoreUnavailable`].

use crate::catalog::product::Product;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

// =============================================================================
// ProductStore Trait
// =============================================================================

/// Read/write access to the catalog's system of record
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Product>>;

    /// Active products, ordered by id ascending
    async fn find_active(&self) -> Result<Vec<Product>>;

    /// Active products of one category, ordered by id ascending
    async fn find_by_category(&self, category: &str) -> Result<Vec<Product>>;

    /// Active products with `min <= price <= max`, ordered by id ascending
    async fn find_by_price_range(&self, min: Decimal, max: Decimal) -> Result<Vec<Product>>;

    /// Case-insensitive substring search over name, description, category
    /// and brand, ordered by id ascending
    async fn search_products(&self, keyword: &str) -> Result<Vec<Product>>;

    /// Distinct categories of active products, sorted
    async fn find_distinct_categories(&self) -> Result<Vec<String>>;

    /// The `n` most recently created products, newest first
    async fn find_top_n_by_recency(&self, n: usize) -> Result<Vec<Product>>;

    /// Insert (id 0) or overwrite; returns the persisted row
    async fn save(&self, product: Product) -> Result<Product>;

    /// Returns true when a row was deleted
    async fn delete_by_id(&self, id: i64) -> Result<bool>;
}

/// Store handle
pub type ProductStoreRef = Arc<dyn ProductStore>;

// =============================================================================
// In-Memory Store
// =============================================================================

/// DashMap-backed [`ProductStore`] for tests and the standalone binary
pub struct MemoryProductStore {
    rows: DashMap<i64, Product>,
    next_id: AtomicI64,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn active_sorted(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .rows
            .iter()
            .filter(|row| row.value().active)
            .map(|row| row.value().clone())
            .collect();
        products.sort_by_key(|p| p.id);
        products
    }
}

impl Default for MemoryProductStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.rows.get(&id).map(|row| row.value().clone()))
    }

    async fn find_active(&self) -> Result<Vec<Product>> {
        Ok(self.active_sorted())
    }

    async fn find_by_category(&self, category: &str) -> Result<Vec<Product>> {
        Ok(self
            .active_sorted()
            .into_iter()
            .filter(|p| p.category == category)
            .collect())
    }

    async fn find_by_price_range(&self, min: Decimal, max: Decimal) -> Result<Vec<Product>> {
        Ok(self
            .active_sorted()
            .into_iter()
            .filter(|p| p.in_price_range(min, max))
            .collect())
    }

    async fn search_products(&self, keyword: &str) -> Result<Vec<Product>> {
        let keyword_lower = keyword.to_lowercase();
        Ok(self
            .active_sorted()
            .into_iter()
            .filter(|p| p.matches_keyword(&keyword_lower))
            .collect())
    }

    async fn find_distinct_categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> = self
            .active_sorted()
            .into_iter()
            .map(|p| p.category)
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn find_top_n_by_recency(&self, n: usize) -> Result<Vec<Product>> {
        let mut products = self.active_sorted();
        // Newest first; ties resolve to the higher id
        products.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        products.truncate(n);
        Ok(products)
    }

    async fn save(&self, mut product: Product) -> Result<Product> {
        if product.id == 0 {
            product.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        } else {
            // Keep the id counter ahead of explicit ids
            self.next_id.fetch_max(product.id + 1, Ordering::Relaxed);
        }
        self.rows.insert(product.id, product.clone());
        Ok(product)
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        Ok(self.rows.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use rust_decimal_macros::dec;

    fn product(id: i64, name: &str, category: &str, price: Decimal, active: bool) -> Product {
        let now = Utc::now();
        Product {
            id,
            name: name.into(),
            description: String::new(),
            price,
            stock_quantity: 5,
            category: category.into(),
            brand: "Acme".into(),
            image_url: String::new(),
            active,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded() -> MemoryProductStore {
        let store = MemoryProductStore::new();
        store
            .save(product(0, "Trail Runner", "shoes", dec!(89.99), true))
            .await
            .unwrap();
        store
            .save(product(0, "Court Racket", "tennis", dec!(120.00), true))
            .await
            .unwrap();
        store
            .save(product(0, "Retired Boot", "shoes", dec!(30.00), false))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_save_assigns_sequential_ids() {
        let store = seeded().await;
        assert_eq!(store.len(), 3);

        let saved = store
            .save(product(0, "New Ball", "tennis", dec!(5.00), true))
            .await
            .unwrap();
        assert_eq!(saved.id, 4);
    }

    #[tokio::test]
    async fn test_find_active_excludes_inactive_and_sorts() {
        let store = seeded().await;
        let active = store.find_active().await.unwrap();

        assert_eq!(active.len(), 2);
        assert!(active.windows(2).all(|w| w[0].id < w[1].id));
        assert!(active.iter().all(|p| p.active));
    }

    #[tokio::test]
    async fn test_category_and_price_filters() {
        let store = seeded().await;

        let shoes = store.find_by_category("shoes").await.unwrap();
        assert_eq!(shoes.len(), 1);
        assert_eq!(shoes[0].name, "Trail Runner");

        let cheap = store
            .find_by_price_range(dec!(0), dec!(100))
            .await
            .unwrap();
        assert_eq!(cheap.len(), 1);
        assert_eq!(cheap[0].name, "Trail Runner");
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let store = seeded().await;
        let hits = store.search_products("RACKET").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Court Racket");
    }

    #[tokio::test]
    async fn test_distinct_categories_sorted_and_active_only() {
        let store = seeded().await;
        let categories = store.find_distinct_categories().await.unwrap();
        assert_eq!(categories, vec!["shoes".to_string(), "tennis".to_string()]);
    }

    #[tokio::test]
    async fn test_top_n_by_recency_newest_first() {
        let store = MemoryProductStore::new();
        let base = Utc::now();
        for i in 1..=5 {
            let mut p = product(0, &format!("P{i}"), "misc", dec!(1), true);
            p.created_at = base + ChronoDuration::seconds(i);
            store.save(p).await.unwrap();
        }

        let top = store.find_top_n_by_recency(3).await.unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].name, "P5");
        assert_eq!(top[2].name, "P3");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = seeded().await;
        assert!(store.delete_by_id(1).await.unwrap());
        assert!(!store.delete_by_id(1).await.unwrap());
        assert_eq!(store.find_by_id(1).await.unwrap(), None);
    }
}
