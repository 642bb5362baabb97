//! Product Entity
//!
//! The canonical value transported through the cache. Prices are decimals,
//! never floats, so the wire codec cannot drift a cent; timestamps carry
//! second precision or better.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub category: String,
    pub brand: String,
    pub image_url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Case-insensitive substring match against the searchable fields
    pub fn matches_keyword(&self, keyword_lower: &str) -> bool {
        self.name.to_lowercase().contains(keyword_lower)
            || self.description.to_lowercase().contains(keyword_lower)
            || self.category.to_lowercase().contains(keyword_lower)
            || self.brand.to_lowercase().contains(keyword_lower)
    }

    /// Whether the price falls inside `[min, max]`
    pub fn in_price_range(&self, min: Decimal, max: Decimal) -> bool {
        self.price >= min && self.price <= max
    }
}
