use async_trait::async_trait;

use crate::domain::order::Order;
use crate::domain::product::{CatalogProduct, Product, ProductId};
use crate::errors::RankerError;

/// What the shopper was doing when the recommendation was requested. The
/// ranker embeds this in its prompt so the model can reason about relevance.
#[derive(Clone, Debug)]
pub enum RankContext {
    /// Browsing a single product page.
    Product(Product),
    /// Just completed (or is reviewing) an order.
    Order(Order),
}

/// Best-effort external ranking tier. Never a hard dependency: the
/// orchestrator treats every error, and an absent implementation, as a signal
/// to use deterministic candidate ordering instead.
#[async_trait]
pub trait Ranker: Send + Sync {
    /// Advisory liveness probe. A `false` here saves the latency of a doomed
    /// ranking call; a `true` is not a correctness guarantee.
    async fn is_available(&self) -> bool;

    /// Ask the model to select and order `limit` ids from `candidates`.
    /// Returns ids in model-proposed order, already filtered to the candidate
    /// pool and deduplicated.
    async fn rank(
        &self,
        context: &RankContext,
        candidates: &[CatalogProduct],
        limit: usize,
    ) -> Result<Vec<ProductId>, RankerError>;

    /// Fire-and-forget request that coaxes the model into memory ahead of the
    /// first real ranking call. Returns immediately; failures are logged by
    /// the implementation and never propagated.
    async fn warmup(&self);
}
