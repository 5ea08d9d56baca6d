use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub i64);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog item as managed by the (out-of-scope) storefront admin tooling.
/// Identity is immutable; attributes may change between snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub categories: Vec<String>,
    /// 0-100, higher is greener.
    pub sustainability_score: u8,
    pub carbon_footprint_kg: f64,
}

impl Product {
    pub fn shares_category_with(&self, other: &Product) -> bool {
        self.categories
            .iter()
            .any(|category| other.categories.iter().any(|c| c == category))
    }
}

/// A product annotated with its aggregate order count, as served by the
/// catalog snapshot. The count is derived at snapshot-refresh time and may
/// lag live writes by up to the cache TTL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub product: Product,
    pub order_count: u32,
}
