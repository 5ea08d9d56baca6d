//! Recommendation API routes.
//!
//! Endpoints:
//! - `GET  /recommendations?product_id=&order_id=&limit=` — contextual
//!   recommendations; always `200` with a possibly-empty product list
//! - `GET  /products/popular?limit=`                      — popularity list
//! - `POST /llm/prewarm`                                  — trigger model warmup
//!
//! Handlers are thin adapters over the engine; every degradation decision
//! (fallbacks, empty results) is made below this layer.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use verdant_core::domain::order::OrderId;
use verdant_core::domain::product::{Product, ProductId};
use verdant_core::{RecommendationEngine, RecommendationRequest};

#[derive(Clone)]
pub struct ApiState {
    engine: Arc<RecommendationEngine>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationsQuery {
    product_id: Option<i64>,
    order_id: Option<i64>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PopularQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct PrewarmResponse {
    pub warmed: bool,
}

pub fn router(engine: Arc<RecommendationEngine>) -> Router {
    Router::new()
        .route("/recommendations", get(recommendations))
        .route("/products/popular", get(popular))
        .route("/llm/prewarm", post(prewarm))
        .with_state(ApiState { engine })
}

pub async fn recommendations(
    State(state): State<ApiState>,
    Query(query): Query<RecommendationsQuery>,
) -> Json<ProductsResponse> {
    let request = RecommendationRequest {
        product_id: query.product_id.map(ProductId),
        order_id: query.order_id.map(OrderId),
        limit: query.limit,
    };

    debug!(
        event_name = "api.recommendations",
        product_id = ?query.product_id,
        order_id = ?query.order_id,
        limit = ?query.limit,
        "serving recommendation request"
    );

    Json(ProductsResponse { products: state.engine.recommend(request).await })
}

pub async fn popular(
    State(state): State<ApiState>,
    Query(query): Query<PopularQuery>,
) -> Json<ProductsResponse> {
    Json(ProductsResponse { products: state.engine.popular_products(query.limit).await })
}

pub async fn prewarm(State(state): State<ApiState>) -> Json<PrewarmResponse> {
    Json(PrewarmResponse { warmed: state.engine.prewarm().await })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::extract::{Query, State};
    use axum::Json;

    use verdant_core::Catalog;
    use verdant_db::{connect_with_settings, migrations, DemoCatalog, SqlCatalog};

    use super::*;

    async fn seeded_state() -> ApiState {
        let pool = connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations should apply");
        DemoCatalog::load(&pool).await.expect("fixtures should load");

        let catalog = Arc::new(SqlCatalog::new(pool, Duration::from_secs(300)));
        let engine =
            Arc::new(RecommendationEngine::new(catalog as Arc<dyn Catalog>, None));
        ApiState { engine }
    }

    #[tokio::test]
    async fn recommendations_route_excludes_the_seed_product() {
        let state = seeded_state().await;

        let query = RecommendationsQuery { product_id: Some(1), limit: Some(3), ..Default::default() };
        let Json(payload) = recommendations(State(state), Query(query)).await;

        assert_eq!(payload.products.len(), 3);
        assert!(payload.products.iter().all(|product| product.id != ProductId(1)));
    }

    #[tokio::test]
    async fn recommendations_route_returns_popularity_without_context() {
        let state = seeded_state().await;

        let Json(payload) =
            recommendations(State(state), Query(RecommendationsQuery::default())).await;

        // Product 4 appears in three demo orders; nothing else comes close.
        assert_eq!(payload.products.first().map(|product| product.id), Some(ProductId(4)));
    }

    #[tokio::test]
    async fn popular_route_orders_by_demand_then_id() {
        let state = seeded_state().await;

        let Json(payload) = popular(State(state), Query(PopularQuery { limit: Some(3) })).await;

        let ids: Vec<i64> = payload.products.iter().map(|product| product.id.0).collect();
        assert_eq!(ids, vec![4, 1, 2]);
    }

    #[tokio::test]
    async fn prewarm_route_reports_unwarmed_when_ranking_is_disabled() {
        let state = seeded_state().await;

        let Json(payload) = prewarm(State(state)).await;
        assert!(!payload.warmed);
    }
}
