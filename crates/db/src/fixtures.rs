//! Deterministic demo fixtures for the storefront catalog.
//!
//! Loaded by `verdant seed` and by integration tests. Inserts use
//! `INSERT OR REPLACE` so repeated loads converge on the same state.

use crate::DbPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: u32,
    pub orders: u32,
}

pub struct DemoCatalog;

impl DemoCatalog {
    pub const PRODUCT_COUNT: u32 = 10;
    pub const ORDER_COUNT: u32 = 4;

    const SQL: &'static str = r#"
INSERT OR REPLACE INTO product
    (id, name, description, price, sustainability_score, carbon_footprint_kg)
VALUES
    (1, 'Nebula Night Cream', 'Restorative night cream with algae extract', '24.99', 88, 0.4),
    (2, 'Solar Flare Balm', 'SPF lip balm in a compostable tube', '9.50', 92, 0.1),
    (3, 'Lunar Loofah', 'Plastic-free shower loofah grown, not made', '6.00', 97, 0.05),
    (4, 'Starlight Soap', 'Cold-process bar soap with juniper and sage', '7.25', 95, 0.08),
    (5, 'Comet Compost Kit', 'Countertop compost starter with bokashi bran', '39.00', 99, 1.1),
    (6, 'Terra Tote', 'Recycled-canvas tote with cork handles', '28.00', 90, 0.9),
    (7, 'Aurora Candle', 'Soy-wax candle, cedar and bergamot', '18.50', 85, 0.3),
    (8, 'Gravity Grow Light', 'Low-wattage full-spectrum grow light', '54.00', 70, 4.2),
    (9, 'Eclipse Essence Oil', 'Facial oil blend, rosehip and sea buckthorn', '31.00', 86, 0.2),
    (10, 'Orbit Oat Scrub', 'Gentle exfoliating scrub with oat silk', '14.75', 91, 0.15);

INSERT OR REPLACE INTO product_category (product_id, category) VALUES
    (1, 'skincare'), (1, 'botanical'),
    (2, 'skincare'), (2, 'solar'),
    (3, 'bath'), (3, 'zero-waste'),
    (4, 'bath'), (4, 'botanical'),
    (5, 'garden'), (5, 'zero-waste'),
    (6, 'accessories'), (6, 'zero-waste'),
    (7, 'home'), (7, 'botanical'),
    (8, 'garden'), (8, 'solar'),
    (9, 'skincare'), (9, 'botanical'),
    (10, 'bath'), (10, 'skincare');

INSERT OR REPLACE INTO customer_order (id, user_id, created_at) VALUES
    (1, '3d9f1b52-8a1e-4f60-9c2d-5a4b1f0e7c21', '2025-05-02T10:15:00Z'),
    (2, '3d9f1b52-8a1e-4f60-9c2d-5a4b1f0e7c21', '2025-05-19T18:42:00Z'),
    (3, '7c41ae09-2b77-45d3-8e65-0d9f3a6c1b84', '2025-06-01T08:03:00Z'),
    (4, 'b2e55c7d-4f19-4a3c-9b80-6e2d8c5f0a47', '2025-06-11T21:27:00Z');

INSERT OR REPLACE INTO order_line
    (order_id, product_id, quantity, name, unit_price, category, sustainability_score)
VALUES
    (1, 1, 1, 'Nebula Night Cream', '24.99', 'skincare', 88),
    (1, 9, 1, 'Eclipse Essence Oil', '31.00', 'skincare', 86),
    (2, 3, 2, 'Lunar Loofah', '6.00', 'bath', 97),
    (2, 4, 1, 'Starlight Soap', '7.25', 'bath', 95),
    (3, 4, 3, 'Starlight Soap', '7.25', 'botanical', 95),
    (3, 7, 1, 'Aurora Candle', '18.50', 'home', 85),
    (4, 4, 1, 'Starlight Soap', '7.25', 'bath', 95),
    (4, 2, 2, 'Solar Flare Balm', '9.50', 'solar', 92);
"#;

    pub async fn load(pool: &DbPool) -> Result<SeedSummary, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(SeedSummary { products: Self::PRODUCT_COUNT, orders: Self::ORDER_COUNT })
    }

    pub async fn verify(pool: &DbPool) -> Result<bool, sqlx::Error> {
        let products: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product").fetch_one(pool).await?;
        let orders: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM customer_order").fetch_one(pool).await?;
        let orphan_categories: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product_category pc \
             WHERE NOT EXISTS (SELECT 1 FROM product p WHERE p.id = pc.product_id)",
        )
        .fetch_one(pool)
        .await?;

        Ok(products >= Self::PRODUCT_COUNT as i64
            && orders >= Self::ORDER_COUNT as i64
            && orphan_categories == 0)
    }
}
