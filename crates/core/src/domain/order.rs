use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::ProductId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completed checkout. Append-only once created; this subsystem only reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

/// Line item with attributes snapshotted at purchase time, so later catalog
/// edits do not rewrite order history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub name: String,
    pub unit_price: Decimal,
    pub category: String,
    pub sustainability_score: u8,
}

impl Order {
    /// Distinct category labels across all purchased lines, in first-seen order.
    pub fn distinct_categories(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for line in &self.lines {
            if !seen.contains(&line.category.as_str()) {
                seen.push(line.category.as_str());
            }
        }
        seen
    }

    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.lines.iter().map(|line| line.product_id)
    }
}
