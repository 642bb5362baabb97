//! Product Catalog
//!
//! Domain-facing surface of the caching core: the product entity, the
//! store port, the namespace policy table, the service, and the warmer.

pub mod namespace;
pub mod product;
pub mod service;
pub mod store;
pub mod value;
pub mod warmer;

pub use namespace::Namespace;
pub use product::Product;
pub use service::ProductService;
pub use store::{MemoryProductStore, ProductStore, ProductStoreRef};
pub use value::CatalogValue;
pub use warmer::{CacheWarmer, WarmSummary};
