//! Cached Value Union
//!
//! The composite cache carries one value type; the catalog's three cached
//! shapes live behind this enum. The tag travels on the wire so a decoded
//! value always knows its shape.

use crate::catalog::product::Product;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Every value shape the catalog caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CatalogValue {
    Product(Product),
    ProductList(Vec<Product>),
    Categories(Vec<String>),
}

impl CatalogValue {
    pub fn into_product(self) -> Result<Product> {
        match self {
            CatalogValue::Product(product) => Ok(product),
            other => Err(shape_mismatch("product", &other)),
        }
    }

    pub fn into_product_list(self) -> Result<Vec<Product>> {
        match self {
            CatalogValue::ProductList(products) => Ok(products),
            other => Err(shape_mismatch("product list", &other)),
        }
    }

    pub fn into_categories(self) -> Result<Vec<String>> {
        match self {
            CatalogValue::Categories(categories) => Ok(categories),
            other => Err(shape_mismatch("category list", &other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CatalogValue::Product(_) => "product",
            CatalogValue::ProductList(_) => "product list",
            CatalogValue::Categories(_) => "category list",
        }
    }
}

fn shape_mismatch(expected: &str, got: &CatalogValue) -> Error {
    Error::Internal(format!(
        "cached value shape mismatch: expected {expected}, got {}",
        got.kind()
    ))
}

impl From<Product> for CatalogValue {
    fn from(product: Product) -> Self {
        CatalogValue::Product(product)
    }
}

impl From<Vec<Product>> for CatalogValue {
    fn from(products: Vec<Product>) -> Self {
        CatalogValue::ProductList(products)
    }
}

impl From<Vec<String>> for CatalogValue {
    fn from(categories: Vec<String>) -> Self {
        CatalogValue::Categories(categories)
    }
}
