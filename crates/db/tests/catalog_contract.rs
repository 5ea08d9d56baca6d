//! Contract tests for the sqlite catalog accessor against the demo fixtures.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use verdant_core::catalog::Catalog;
use verdant_core::domain::order::OrderId;
use verdant_core::domain::product::ProductId;
use verdant_db::{connect_with_settings, migrations, DbPool, DemoCatalog, ManualClock, SqlCatalog};

async fn seeded_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 5)
        .await
        .expect("in-memory database should connect");
    migrations::run_pending(&pool).await.expect("migrations should apply");
    DemoCatalog::load(&pool).await.expect("fixtures should load");
    pool
}

#[tokio::test]
async fn snapshot_joins_products_with_order_counts() {
    let pool = seeded_pool().await;
    let catalog = SqlCatalog::new(pool.clone(), Duration::from_secs(300));

    let snapshot = catalog.products_with_counts().await.expect("snapshot should load");
    assert_eq!(snapshot.len(), DemoCatalog::PRODUCT_COUNT as usize);

    // Returned in id order; counts derived from order_line rows.
    let soap = &snapshot[3];
    assert_eq!(soap.product.id, ProductId(4));
    assert_eq!(soap.product.name, "Starlight Soap");
    assert_eq!(soap.order_count, 3);
    assert_eq!(soap.product.price, Decimal::new(725, 2));

    let compost = &snapshot[4];
    assert_eq!(compost.product.id, ProductId(5));
    assert_eq!(compost.order_count, 0);

    pool.close().await;
}

#[tokio::test]
async fn product_lookup_includes_categories() {
    let pool = seeded_pool().await;
    let catalog = SqlCatalog::new(pool.clone(), Duration::from_secs(300));

    let cream = catalog
        .product_by_id(ProductId(1))
        .await
        .expect("lookup should succeed")
        .expect("product 1 should exist");
    assert_eq!(cream.categories, vec!["botanical".to_string(), "skincare".to_string()]);
    assert_eq!(cream.sustainability_score, 88);

    let missing = catalog.product_by_id(ProductId(404)).await.expect("lookup should succeed");
    assert!(missing.is_none());

    pool.close().await;
}

#[tokio::test]
async fn order_lookup_returns_snapshotted_lines() {
    let pool = seeded_pool().await;
    let catalog = SqlCatalog::new(pool.clone(), Duration::from_secs(300));

    let order = catalog
        .order_by_id(OrderId(2))
        .await
        .expect("lookup should succeed")
        .expect("order 2 should exist");

    assert_eq!(order.lines.len(), 2);
    assert_eq!(order.lines[0].product_id, ProductId(3));
    assert_eq!(order.lines[0].quantity, 2);
    assert_eq!(order.lines[1].category, "bath");
    assert_eq!(order.distinct_categories(), vec!["bath"]);

    let missing = catalog.order_by_id(OrderId(404)).await.expect("lookup should succeed");
    assert!(missing.is_none());

    pool.close().await;
}

#[tokio::test]
async fn snapshot_is_cached_until_the_ttl_expires() {
    let pool = seeded_pool().await;
    let clock = Arc::new(ManualClock::new());
    let catalog = SqlCatalog::with_clock(pool.clone(), Duration::from_secs(300), clock.clone());

    let first = catalog.products_with_counts().await.expect("snapshot should load");
    assert_eq!(first.len(), 10);

    sqlx::query(
        "INSERT INTO product (id, name, price, sustainability_score, carbon_footprint_kg) \
         VALUES (11, 'Meteor Mister', '12.00', 80, 0.2)",
    )
    .execute(&pool)
    .await
    .expect("insert should succeed");

    // Within the TTL the stale snapshot is served as-is.
    let cached = catalog.products_with_counts().await.expect("snapshot should load");
    assert_eq!(cached.len(), 10);

    clock.advance(Duration::from_secs(301));
    let refreshed = catalog.products_with_counts().await.expect("snapshot should reload");
    assert_eq!(refreshed.len(), 11);

    pool.close().await;
}

#[tokio::test]
async fn invalidation_forces_an_immediate_reload() {
    let pool = seeded_pool().await;
    let catalog = SqlCatalog::new(pool.clone(), Duration::from_secs(300));

    catalog.products_with_counts().await.expect("snapshot should load");
    sqlx::query("DELETE FROM product WHERE id = 10")
        .execute(&pool)
        .await
        .expect("delete should succeed");

    catalog.invalidate_snapshot().await;
    let reloaded = catalog.products_with_counts().await.expect("snapshot should reload");
    assert_eq!(reloaded.len(), 9);

    pool.close().await;
}

#[tokio::test]
async fn repeated_seed_loads_are_idempotent() {
    let pool = seeded_pool().await;

    DemoCatalog::load(&pool).await.expect("second load should succeed");
    assert!(DemoCatalog::verify(&pool).await.expect("verification should run"));

    let products: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM product").fetch_one(&pool).await.unwrap();
    assert_eq!(products, DemoCatalog::PRODUCT_COUNT as i64);

    pool.close().await;
}
