//! Recommendation orchestrator.
//!
//! Composes the catalog snapshot, candidate selection, and the optional LLM
//! ranking tier, with a fallback at every failure point. The contract is
//! strict: `recommend` never surfaces an error, always returns *some* list,
//! and that list is empty only when the catalog itself is empty or
//! unreachable.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::domain::order::{Order, OrderId};
use crate::domain::product::{CatalogProduct, Product, ProductId};
use crate::ranker::{RankContext, Ranker};
use crate::selector;

pub const DEFAULT_LIMIT: usize = 4;

#[derive(Clone, Copy, Debug, Default)]
pub struct RecommendationRequest {
    pub product_id: Option<ProductId>,
    pub order_id: Option<OrderId>,
    pub limit: Option<usize>,
}

pub struct RecommendationEngine {
    catalog: Arc<dyn Catalog>,
    /// `None` when the LLM path is disabled by configuration; in that case no
    /// probe or ranking call is ever attempted.
    ranker: Option<Arc<dyn Ranker>>,
    default_limit: usize,
}

impl RecommendationEngine {
    pub fn new(catalog: Arc<dyn Catalog>, ranker: Option<Arc<dyn Ranker>>) -> Self {
        Self { catalog, ranker, default_limit: DEFAULT_LIMIT }
    }

    pub fn with_default_limit(mut self, default_limit: usize) -> Self {
        self.default_limit = default_limit.max(1);
        self
    }

    /// Produce an ordered list of at most `limit` products for the request's
    /// context. Order id takes precedence over product id when both are set;
    /// with neither, this is plain popularity.
    pub async fn recommend(&self, request: RecommendationRequest) -> Vec<Product> {
        let limit = request.limit.unwrap_or(self.default_limit).max(1);

        let snapshot = match self.catalog.products_with_counts().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(
                    event_name = "recommend.catalog_unavailable",
                    error = %error,
                    "catalog snapshot unavailable, returning empty recommendations"
                );
                return Vec::new();
            }
        };
        if snapshot.is_empty() {
            return Vec::new();
        }

        if let Some(order_id) = request.order_id {
            return self.recommend_for_order(order_id, &snapshot, limit).await;
        }
        if let Some(product_id) = request.product_id {
            return self.recommend_for_product(product_id, &snapshot, limit).await;
        }

        strip_counts(selector::popular(&snapshot, limit, &HashSet::new()))
    }

    /// Popularity-only listing, the same ordering `recommend` falls back to.
    pub async fn popular_products(&self, limit: Option<usize>) -> Vec<Product> {
        let limit = limit.unwrap_or(self.default_limit).max(1);

        match self.catalog.products_with_counts().await {
            Ok(snapshot) => strip_counts(selector::popular(&snapshot, limit, &HashSet::new())),
            Err(error) => {
                warn!(
                    event_name = "popular.catalog_unavailable",
                    error = %error,
                    "catalog snapshot unavailable, returning empty popular list"
                );
                Vec::new()
            }
        }
    }

    /// Probe the ranking endpoint and, when it answers, kick off a
    /// fire-and-forget model warmup. Returns whether warmup was triggered.
    pub async fn prewarm(&self) -> bool {
        let Some(ranker) = &self.ranker else {
            return false;
        };

        if ranker.is_available().await {
            ranker.warmup().await;
            true
        } else {
            debug!(
                event_name = "prewarm.ranker_unavailable",
                "ranker probe failed, skipping model warmup"
            );
            false
        }
    }

    async fn recommend_for_order(
        &self,
        order_id: OrderId,
        snapshot: &[CatalogProduct],
        limit: usize,
    ) -> Vec<Product> {
        let order = match self.catalog.order_by_id(order_id).await {
            Ok(Some(order)) if !order.lines.is_empty() => order,
            Ok(_) => {
                debug!(
                    event_name = "recommend.order_seed_missing",
                    order_id = %order_id,
                    "order missing or empty, using popularity fallback"
                );
                return strip_counts(selector::popular(snapshot, limit, &HashSet::new()));
            }
            Err(error) => {
                warn!(
                    event_name = "recommend.order_load_failed",
                    order_id = %order_id,
                    error = %error,
                    "order lookup failed, using popularity fallback"
                );
                return strip_counts(selector::popular(snapshot, limit, &HashSet::new()));
            }
        };

        let exclude: HashSet<ProductId> = order.product_ids().collect();
        let fallback = selector::popular(snapshot, limit, &exclude);
        let candidates = selector::order_seeded(&order, snapshot, limit);
        if candidates.is_empty() {
            return strip_counts(fallback);
        }

        let ranked = self
            .try_rank(RankContext::Order(order), &candidates, limit)
            .await
            .unwrap_or_default();
        assemble(ranked, &candidates, &fallback, limit)
    }

    async fn recommend_for_product(
        &self,
        product_id: ProductId,
        snapshot: &[CatalogProduct],
        limit: usize,
    ) -> Vec<Product> {
        let seed = match self.catalog.product_by_id(product_id).await {
            Ok(Some(seed)) if !seed.categories.is_empty() => seed,
            Ok(_) => {
                debug!(
                    event_name = "recommend.product_seed_missing",
                    product_id = %product_id,
                    "seed product missing or categoryless, using popularity fallback"
                );
                let exclude: HashSet<ProductId> = [product_id].into_iter().collect();
                return strip_counts(selector::popular(snapshot, limit, &exclude));
            }
            Err(error) => {
                warn!(
                    event_name = "recommend.product_load_failed",
                    product_id = %product_id,
                    error = %error,
                    "seed lookup failed, using popularity fallback"
                );
                let exclude: HashSet<ProductId> = [product_id].into_iter().collect();
                return strip_counts(selector::popular(snapshot, limit, &exclude));
            }
        };

        let exclude: HashSet<ProductId> = [seed.id].into_iter().collect();
        let fallback = selector::popular(snapshot, limit, &exclude);
        let candidates = selector::product_seeded(&seed, snapshot, limit);
        if candidates.is_empty() {
            return strip_counts(fallback);
        }

        let ranked = self
            .try_rank(RankContext::Product(seed), &candidates, limit)
            .await
            .unwrap_or_default();
        assemble(ranked, &candidates, &fallback, limit)
    }

    /// One ranking attempt, at most. Any failure, and any precondition miss,
    /// quietly yields `None` so the caller pads from candidates instead.
    async fn try_rank(
        &self,
        context: RankContext,
        candidates: &[CatalogProduct],
        limit: usize,
    ) -> Option<Vec<ProductId>> {
        let ranker = self.ranker.as_ref()?;
        if candidates.len() < 2 {
            return None;
        }
        if !ranker.is_available().await {
            debug!(
                event_name = "recommend.ranker_probe_failed",
                "ranker probe failed, skipping ranking"
            );
            return None;
        }

        match ranker.rank(&context, candidates, limit).await {
            Ok(ids) if !ids.is_empty() => Some(ids),
            Ok(_) => None,
            Err(error) => {
                warn!(
                    event_name = "recommend.ranking_failed",
                    error = %error,
                    "ranking attempt failed, using candidate ordering"
                );
                None
            }
        }
    }
}

/// Merge ranked ids with candidate and fallback ordering into the final list:
/// ranked hits first (model order), then remaining candidates (selection
/// order), then fallback padding. Padding is appended, never interleaved, and
/// nothing is re-sorted afterwards. Duplicates are dropped on first sight.
fn assemble(
    ranked: Vec<ProductId>,
    candidates: &[CatalogProduct],
    fallback: &[CatalogProduct],
    limit: usize,
) -> Vec<Product> {
    let by_id: HashMap<ProductId, &CatalogProduct> = candidates
        .iter()
        .map(|candidate| (candidate.product.id, candidate))
        .collect();

    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(limit);

    for id in ranked {
        if result.len() >= limit {
            break;
        }
        // Ids outside the pool were already discarded by the ranker; this
        // guards trait implementations that are less careful.
        if let Some(candidate) = by_id.get(&id) {
            if seen.insert(id) {
                result.push(candidate.product.clone());
            }
        }
    }

    for pool in [candidates, fallback] {
        for candidate in pool {
            if result.len() >= limit {
                return result;
            }
            if seen.insert(candidate.product.id) {
                result.push(candidate.product.clone());
            }
        }
    }

    result
}

fn strip_counts(pool: Vec<CatalogProduct>) -> Vec<Product> {
    pool.into_iter().map(|candidate| candidate.product).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::domain::order::OrderLine;
    use crate::errors::{CatalogError, RankerError};

    struct FixedCatalog {
        snapshot: Vec<CatalogProduct>,
        orders: Vec<Order>,
    }

    #[async_trait]
    impl Catalog for FixedCatalog {
        async fn products_with_counts(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
            Ok(self.snapshot.clone())
        }

        async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, CatalogError> {
            Ok(self.orders.iter().find(|order| order.id == id).cloned())
        }

        async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
            Ok(self
                .snapshot
                .iter()
                .find(|candidate| candidate.product.id == id)
                .map(|candidate| candidate.product.clone()))
        }
    }

    struct FailingCatalog;

    #[async_trait]
    impl Catalog for FailingCatalog {
        async fn products_with_counts(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }

        async fn order_by_id(&self, _id: OrderId) -> Result<Option<Order>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }

        async fn product_by_id(&self, _id: ProductId) -> Result<Option<Product>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }
    }

    /// Panics on any interaction. Used to prove the disabled path never
    /// reaches for the ranker.
    struct UnreachableRanker;

    #[async_trait]
    impl Ranker for UnreachableRanker {
        async fn is_available(&self) -> bool {
            panic!("ranker must not be probed in this scenario");
        }

        async fn rank(
            &self,
            _context: &RankContext,
            _candidates: &[CatalogProduct],
            _limit: usize,
        ) -> Result<Vec<ProductId>, RankerError> {
            panic!("ranker must not be called in this scenario");
        }

        async fn warmup(&self) {
            panic!("ranker must not be warmed in this scenario");
        }
    }

    struct ScriptedRanker {
        available: bool,
        outcome: Mutex<Result<Vec<ProductId>, RankerError>>,
        calls: Mutex<u32>,
    }

    impl ScriptedRanker {
        fn returning(ids: Vec<i64>) -> Self {
            Self {
                available: true,
                outcome: Mutex::new(Ok(ids.into_iter().map(ProductId).collect())),
                calls: Mutex::new(0),
            }
        }

        fn failing(error: RankerError) -> Self {
            Self { available: true, outcome: Mutex::new(Err(error)), calls: Mutex::new(0) }
        }

        fn unavailable() -> Self {
            Self {
                available: false,
                outcome: Mutex::new(Ok(Vec::new())),
                calls: Mutex::new(0),
            }
        }

        fn rank_calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Ranker for ScriptedRanker {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn rank(
            &self,
            _context: &RankContext,
            _candidates: &[CatalogProduct],
            _limit: usize,
        ) -> Result<Vec<ProductId>, RankerError> {
            *self.calls.lock().unwrap() += 1;
            self.outcome.lock().unwrap().clone()
        }

        async fn warmup(&self) {}
    }

    fn product(id: i64, categories: &[&str]) -> Product {
        Product {
            id: ProductId(id),
            name: format!("Product {id}"),
            description: Some(format!("Description for product {id}")),
            price: Decimal::new(2499, 2),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            sustainability_score: 75,
            carbon_footprint_kg: 0.8,
        }
    }

    fn entry(id: i64, categories: &[&str], order_count: u32) -> CatalogProduct {
        CatalogProduct { product: product(id, categories), order_count }
    }

    fn order(id: i64, lines: &[(i64, &str)]) -> Order {
        Order {
            id: OrderId(id),
            user_id: Uuid::nil(),
            created_at: Utc::now(),
            lines: lines
                .iter()
                .map(|(product_id, category)| OrderLine {
                    product_id: ProductId(*product_id),
                    quantity: 1,
                    name: format!("Product {product_id}"),
                    unit_price: Decimal::new(2499, 2),
                    category: category.to_string(),
                    sustainability_score: 75,
                })
                .collect(),
        }
    }

    /// Ten products over two categories; product 1 shares category "a" with
    /// three others while the "b" products dominate on popularity.
    fn two_category_snapshot() -> Vec<CatalogProduct> {
        vec![
            entry(1, &["a"], 0),
            entry(2, &["a"], 1),
            entry(3, &["a"], 2),
            entry(4, &["a"], 0),
            entry(5, &["b"], 9),
            entry(6, &["b"], 8),
            entry(7, &["b"], 7),
            entry(8, &["b"], 6),
            entry(9, &["b"], 5),
            entry(10, &["b"], 4),
        ]
    }

    fn engine_with(
        snapshot: Vec<CatalogProduct>,
        orders: Vec<Order>,
        ranker: Option<Arc<dyn Ranker>>,
    ) -> RecommendationEngine {
        RecommendationEngine::new(Arc::new(FixedCatalog { snapshot, orders }), ranker)
    }

    fn ids(products: &[Product]) -> Vec<i64> {
        products.iter().map(|product| product.id.0).collect()
    }

    #[tokio::test]
    async fn product_seed_with_ranker_disabled_pads_matches_with_popularity() {
        // Scenario: limit 4, three same-category matches, LLM disabled. The
        // three matches come first in snapshot order, then one popular pad.
        let engine = engine_with(two_category_snapshot(), Vec::new(), None);

        let result = engine
            .recommend(RecommendationRequest {
                product_id: Some(ProductId(1)),
                limit: Some(4),
                ..Default::default()
            })
            .await;

        assert_eq!(ids(&result), vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn ranker_is_skipped_when_no_rankable_pool_exists() {
        // The engine holds the panicking double, so the test fails loudly if
        // either path probes or ranks: no-seed requests go straight to
        // popularity, and a single-candidate pool is below the ranking floor.
        let snapshot = vec![entry(1, &["a"], 0), entry(2, &["a"], 1), entry(3, &["b"], 5)];
        let engine = engine_with(snapshot, Vec::new(), Some(Arc::new(UnreachableRanker)));

        let no_seed = engine
            .recommend(RecommendationRequest { limit: Some(2), ..Default::default() })
            .await;
        assert_eq!(ids(&no_seed), vec![3, 2]);

        let thin_pool = engine
            .recommend(RecommendationRequest {
                product_id: Some(ProductId(1)),
                limit: Some(1),
                ..Default::default()
            })
            .await;
        assert_eq!(ids(&thin_pool), vec![2]);
    }

    #[tokio::test]
    async fn order_seed_uses_ranker_order_when_ranking_succeeds() {
        // Scenario: two lines in category c, five other c products, ranker
        // returns four valid ids; result is exactly those in model order.
        let snapshot = vec![
            entry(1, &["c"], 5),
            entry(2, &["c"], 4),
            entry(3, &["c"], 0),
            entry(4, &["c"], 1),
            entry(5, &["c"], 2),
            entry(6, &["c"], 3),
            entry(7, &["c"], 9),
        ];
        let ranker = Arc::new(ScriptedRanker::returning(vec![6, 3, 7, 4]));
        let engine = engine_with(
            snapshot,
            vec![order(11, &[(1, "c"), (2, "c")])],
            Some(ranker.clone()),
        );

        let result = engine
            .recommend(RecommendationRequest {
                order_id: Some(OrderId(11)),
                limit: Some(4),
                ..Default::default()
            })
            .await;

        assert_eq!(ids(&result), vec![6, 3, 7, 4]);
        assert_eq!(ranker.rank_calls(), 1);
    }

    #[tokio::test]
    async fn short_ranked_list_is_padded_from_remaining_candidates() {
        let snapshot = vec![
            entry(1, &["c"], 0),
            entry(2, &["c"], 0),
            entry(3, &["c"], 0),
            entry(4, &["c"], 0),
            entry(5, &["c"], 0),
        ];
        let ranker = Arc::new(ScriptedRanker::returning(vec![4, 3]));
        let engine =
            engine_with(snapshot, vec![order(11, &[(1, "c")])], Some(ranker));

        let result = engine
            .recommend(RecommendationRequest {
                order_id: Some(OrderId(11)),
                limit: Some(4),
                ..Default::default()
            })
            .await;

        // Ranked pair first, then candidate order, never interleaved.
        assert_eq!(ids(&result), vec![4, 3, 2, 5]);
    }

    #[tokio::test]
    async fn insufficient_confidence_falls_back_to_candidate_path_exactly() {
        let snapshot = two_category_snapshot();
        let failing = Arc::new(ScriptedRanker::failing(
            RankerError::InsufficientConfidence { parsed: 1, required: 2 },
        ));
        let with_ranker =
            engine_with(snapshot.clone(), Vec::new(), Some(failing));
        let without_ranker = engine_with(snapshot, Vec::new(), None);

        let request = RecommendationRequest {
            product_id: Some(ProductId(1)),
            limit: Some(4),
            ..Default::default()
        };

        // A partial ranked result must not leak through; the outcome equals
        // the deterministic candidate path bit for bit.
        assert_eq!(
            ids(&with_ranker.recommend(request).await),
            ids(&without_ranker.recommend(request).await),
        );
    }

    #[tokio::test]
    async fn unavailable_ranker_is_probed_but_never_ranked() {
        let ranker = Arc::new(ScriptedRanker::unavailable());
        let engine =
            engine_with(two_category_snapshot(), Vec::new(), Some(ranker.clone()));

        let request = RecommendationRequest {
            product_id: Some(ProductId(1)),
            limit: Some(4),
            ..Default::default()
        };
        let first = engine.recommend(request).await;
        let second = engine.recommend(request).await;

        assert_eq!(ranker.rank_calls(), 0);
        // Deterministic fallback ordering: identical inputs, identical output.
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(ids(&first), vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn result_never_exceeds_limit_and_never_duplicates() {
        let engine = engine_with(two_category_snapshot(), Vec::new(), None);

        for limit in 1..=10 {
            let result = engine
                .recommend(RecommendationRequest {
                    product_id: Some(ProductId(1)),
                    limit: Some(limit),
                    ..Default::default()
                })
                .await;

            assert!(result.len() <= limit);
            let mut unique: Vec<i64> = ids(&result);
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), result.len());
            assert!(!ids(&result).contains(&1), "seed must never be recommended");
        }
    }

    #[tokio::test]
    async fn order_results_exclude_already_purchased_products() {
        let snapshot = vec![
            entry(1, &["c"], 9),
            entry(2, &["c"], 8),
            entry(3, &["c"], 1),
            entry(4, &["c"], 1),
        ];
        let engine = engine_with(snapshot, vec![order(11, &[(1, "c"), (2, "c")])], None);

        let result = engine
            .recommend(RecommendationRequest {
                order_id: Some(OrderId(11)),
                limit: Some(4),
                ..Default::default()
            })
            .await;

        // Purchased products 1 and 2 are the most popular, yet must not be
        // padded back in from the fallback tier.
        assert_eq!(ids(&result), vec![3, 4]);
    }

    #[tokio::test]
    async fn missing_order_or_categoryless_seed_returns_popularity() {
        let engine = engine_with(two_category_snapshot(), Vec::new(), None);

        let by_order = engine
            .recommend(RecommendationRequest {
                order_id: Some(OrderId(404)),
                limit: Some(3),
                ..Default::default()
            })
            .await;
        assert_eq!(ids(&by_order), vec![5, 6, 7]);

        let by_missing_product = engine
            .recommend(RecommendationRequest {
                product_id: Some(ProductId(404)),
                limit: Some(3),
                ..Default::default()
            })
            .await;
        assert_eq!(ids(&by_missing_product), vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn no_seed_returns_popularity_directly() {
        let engine = engine_with(two_category_snapshot(), Vec::new(), None);

        let result = engine
            .recommend(RecommendationRequest { limit: Some(2), ..Default::default() })
            .await;
        assert_eq!(ids(&result), vec![5, 6]);
    }

    #[tokio::test]
    async fn empty_catalog_returns_empty_everywhere() {
        let engine = engine_with(Vec::new(), Vec::new(), None);

        assert!(engine.recommend(RecommendationRequest::default()).await.is_empty());
        assert!(engine
            .recommend(RecommendationRequest {
                product_id: Some(ProductId(1)),
                ..Default::default()
            })
            .await
            .is_empty());
        assert!(engine.popular_products(None).await.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_degrades_to_empty_result_not_error() {
        let engine = RecommendationEngine::new(Arc::new(FailingCatalog), None);

        assert!(engine.recommend(RecommendationRequest::default()).await.is_empty());
        assert!(engine.popular_products(Some(4)).await.is_empty());
    }

    #[tokio::test]
    async fn prewarm_reports_ranker_state() {
        let disabled = engine_with(Vec::new(), Vec::new(), None);
        assert!(!disabled.prewarm().await);

        let down = engine_with(
            Vec::new(),
            Vec::new(),
            Some(Arc::new(ScriptedRanker::unavailable())),
        );
        assert!(!down.prewarm().await);

        let up = engine_with(
            Vec::new(),
            Vec::new(),
            Some(Arc::new(ScriptedRanker::returning(Vec::new()))),
        );
        assert!(up.prewarm().await);
    }
}
