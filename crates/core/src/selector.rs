//! Candidate selection over the annotated catalog snapshot.
//!
//! All functions here are pure: they take the snapshot as a slice and return
//! owned pools, so the orchestrator and tests can exercise them without a
//! live catalog. Pools are oversampled to `limit * 2` to give the ranker
//! choices and to leave room for fallback padding.

use std::collections::HashSet;

use crate::domain::order::Order;
use crate::domain::product::{CatalogProduct, Product, ProductId};

/// Top-`limit` products by order count, excluding `exclude`. Ties break on
/// ascending product id so fallback ordering is deterministic across calls.
pub fn popular(
    snapshot: &[CatalogProduct],
    limit: usize,
    exclude: &HashSet<ProductId>,
) -> Vec<CatalogProduct> {
    let mut ranked: Vec<&CatalogProduct> = snapshot
        .iter()
        .filter(|candidate| !exclude.contains(&candidate.product.id))
        .collect();

    ranked.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then_with(|| a.product.id.cmp(&b.product.id))
    });

    ranked.into_iter().take(limit).cloned().collect()
}

/// Pool for a shopper viewing `seed`: products sharing at least one category
/// (set intersection, not equality), seed excluded, capped at `limit * 2`.
///
/// When fewer than `limit` category matches exist the pool is topped up with
/// globally popular products until the cap or catalog exhaustion. A seed with
/// no categories, or one with zero matches, yields an empty pool; popularity
/// fallback is the orchestrator's job in that case.
pub fn product_seeded(
    seed: &Product,
    snapshot: &[CatalogProduct],
    limit: usize,
) -> Vec<CatalogProduct> {
    if seed.categories.is_empty() {
        return Vec::new();
    }

    let cap = limit.saturating_mul(2).max(1);
    let mut pool: Vec<CatalogProduct> = snapshot
        .iter()
        .filter(|candidate| {
            candidate.product.id != seed.id && candidate.product.shares_category_with(seed)
        })
        .take(cap)
        .cloned()
        .collect();

    if pool.is_empty() {
        return pool;
    }

    if pool.len() < limit {
        let mut taken: HashSet<ProductId> =
            pool.iter().map(|candidate| candidate.product.id).collect();
        taken.insert(seed.id);

        for candidate in popular(snapshot, snapshot.len(), &taken) {
            if pool.len() >= cap {
                break;
            }
            pool.push(candidate);
        }
    }

    pool
}

/// Pool for a completed order: products in any category the order touched,
/// excluding products already purchased, capped at `limit * 2`. No popularity
/// top-up here; a thin pool just means more fallback padding downstream.
pub fn order_seeded(
    order: &Order,
    snapshot: &[CatalogProduct],
    limit: usize,
) -> Vec<CatalogProduct> {
    let categories: HashSet<&str> = order.distinct_categories().into_iter().collect();
    if categories.is_empty() {
        return Vec::new();
    }

    let purchased: HashSet<ProductId> = order.product_ids().collect();
    let cap = limit.saturating_mul(2).max(1);

    snapshot
        .iter()
        .filter(|candidate| {
            !purchased.contains(&candidate.product.id)
                && candidate
                    .product
                    .categories
                    .iter()
                    .any(|category| categories.contains(category.as_str()))
        })
        .take(cap)
        .cloned()
        .collect()
}
