//! Sqlite-backed catalog accessor.
//!
//! The product snapshot (full scan joined with an order-line aggregation) is
//! the only cached read; orders and single products are fetched directly.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use verdant_core::catalog::Catalog;
use verdant_core::domain::order::{Order, OrderId, OrderLine};
use verdant_core::domain::product::{CatalogProduct, Product, ProductId};
use verdant_core::errors::CatalogError;

use crate::cache::{Clock, SnapshotCache};
use crate::DbPool;

const SNAPSHOT_SQL: &str = "SELECT p.id, p.name, p.description, p.price, \
     p.sustainability_score, p.carbon_footprint_kg, \
     COALESCE(counts.order_count, 0) AS order_count \
     FROM product p \
     LEFT JOIN (SELECT product_id, COUNT(*) AS order_count \
                FROM order_line GROUP BY product_id) counts \
       ON counts.product_id = p.id \
     ORDER BY p.id";

pub struct SqlCatalog {
    pool: DbPool,
    snapshot_cache: SnapshotCache<Vec<CatalogProduct>>,
}

impl SqlCatalog {
    pub fn new(pool: DbPool, cache_ttl: Duration) -> Self {
        Self { pool, snapshot_cache: SnapshotCache::new(cache_ttl) }
    }

    pub fn with_clock(pool: DbPool, cache_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { pool, snapshot_cache: SnapshotCache::with_clock(cache_ttl, clock) }
    }

    /// Drop the cached snapshot so the next read recomputes it.
    pub async fn invalidate_snapshot(&self) {
        self.snapshot_cache.invalidate().await;
    }

    async fn load_snapshot(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
        let rows = sqlx::query(SNAPSHOT_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        let mut categories = self.load_all_categories().await?;

        rows.into_iter()
            .map(|row| {
                let id: i64 = get(&row, "id")?;
                let order_count: i64 = get(&row, "order_count")?;
                Ok(CatalogProduct {
                    product: decode_product(&row, categories.remove(&id).unwrap_or_default())?,
                    order_count: u32::try_from(order_count).unwrap_or(0),
                })
            })
            .collect()
    }

    async fn load_all_categories(&self) -> Result<HashMap<i64, Vec<String>>, CatalogError> {
        let rows = sqlx::query(
            "SELECT product_id, category FROM product_category ORDER BY product_id, category",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut by_product: HashMap<i64, Vec<String>> = HashMap::new();
        for row in rows {
            let product_id: i64 = get(&row, "product_id")?;
            let category: String = get(&row, "category")?;
            by_product.entry(product_id).or_default().push(category);
        }
        Ok(by_product)
    }

    async fn load_categories_for(&self, product_id: i64) -> Result<Vec<String>, CatalogError> {
        let rows = sqlx::query(
            "SELECT category FROM product_category WHERE product_id = ?1 ORDER BY category",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.iter().map(|row| get(row, "category")).collect()
    }
}

#[async_trait]
impl Catalog for SqlCatalog {
    async fn products_with_counts(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
        if let Some(snapshot) = self.snapshot_cache.get().await {
            return Ok(snapshot);
        }

        // A racing refill does the same pure derivation; last write wins.
        let snapshot = self.load_snapshot().await?;
        debug!(
            event_name = "catalog.snapshot_refreshed",
            products = snapshot.len(),
            "catalog snapshot recomputed"
        );
        self.snapshot_cache.store(snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, CatalogError> {
        let Some(row) =
            sqlx::query("SELECT id, user_id, created_at FROM customer_order WHERE id = ?1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?
        else {
            return Ok(None);
        };

        let line_rows = sqlx::query(
            "SELECT product_id, quantity, name, unit_price, category, sustainability_score \
             FROM order_line WHERE order_id = ?1 ORDER BY product_id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let lines = line_rows
            .iter()
            .map(decode_order_line)
            .collect::<Result<Vec<_>, _>>()?;

        let user_id: String = get(&row, "user_id")?;
        let created_at: String = get(&row, "created_at")?;

        Ok(Some(Order {
            id,
            user_id: Uuid::parse_str(&user_id)
                .map_err(|error| CatalogError::Decode(format!("order user_id: {error}")))?,
            created_at: parse_timestamp(&created_at)?,
            lines,
        }))
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        let Some(row) = sqlx::query(
            "SELECT id, name, description, price, sustainability_score, carbon_footprint_kg \
             FROM product WHERE id = ?1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        else {
            return Ok(None);
        };

        let categories = self.load_categories_for(id.0).await?;
        Ok(Some(decode_product(&row, categories)?))
    }
}

fn unavailable(error: sqlx::Error) -> CatalogError {
    CatalogError::Unavailable(error.to_string())
}

fn get<'r, T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>>(
    row: &'r SqliteRow,
    column: &str,
) -> Result<T, CatalogError> {
    row.try_get(column)
        .map_err(|error| CatalogError::Decode(format!("column {column}: {error}")))
}

fn decode_product(row: &SqliteRow, categories: Vec<String>) -> Result<Product, CatalogError> {
    let id: i64 = get(row, "id")?;
    let price: String = get(row, "price")?;
    let sustainability_score: i64 = get(row, "sustainability_score")?;

    Ok(Product {
        id: ProductId(id),
        name: get(row, "name")?,
        description: get(row, "description")?,
        price: parse_price(&price)?,
        categories,
        sustainability_score: clamp_score(sustainability_score),
        carbon_footprint_kg: get(row, "carbon_footprint_kg")?,
    })
}

fn decode_order_line(row: &SqliteRow) -> Result<OrderLine, CatalogError> {
    let product_id: i64 = get(row, "product_id")?;
    let quantity: i64 = get(row, "quantity")?;
    let unit_price: String = get(row, "unit_price")?;
    let sustainability_score: i64 = get(row, "sustainability_score")?;

    Ok(OrderLine {
        product_id: ProductId(product_id),
        quantity: u32::try_from(quantity)
            .map_err(|_| CatalogError::Decode(format!("line quantity {quantity}")))?,
        name: get(row, "name")?,
        unit_price: parse_price(&unit_price)?,
        category: get(row, "category")?,
        sustainability_score: clamp_score(sustainability_score),
    })
}

fn parse_price(raw: &str) -> Result<Decimal, CatalogError> {
    Decimal::from_str(raw).map_err(|error| CatalogError::Decode(format!("price `{raw}`: {error}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CatalogError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| CatalogError::Decode(format!("timestamp `{raw}`: {error}")))
}

// Schema CHECK bounds the range already; clamping here keeps decoding total.
fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}
