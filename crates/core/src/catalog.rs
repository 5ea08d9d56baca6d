use async_trait::async_trait;

use crate::domain::order::{Order, OrderId};
use crate::domain::product::{CatalogProduct, Product, ProductId};
use crate::errors::CatalogError;

/// Read-only view of products and orders as needed by the recommendation
/// pipeline. Implemented by `verdant-db` over sqlite; tests substitute
/// in-memory doubles.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Moderately fresh snapshot of every product annotated with its order
    /// count. Implementations may serve a cached snapshot up to their
    /// configured TTL; staleness within that window is an accepted tradeoff.
    async fn products_with_counts(&self) -> Result<Vec<CatalogProduct>, CatalogError>;

    /// Direct order lookup, uncached (one read per checkout-adjacent request).
    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, CatalogError>;

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, CatalogError>;
}
