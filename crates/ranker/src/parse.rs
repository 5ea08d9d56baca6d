//! Model-output parsing.
//!
//! Generation output is free text even when the prompt asks for a single
//! labeled line. Parsing therefore prefers the labeled section but degrades
//! to scanning the whole response for integer tokens, and every extracted id
//! is checked against the candidate pool so a hallucinated id can never reach
//! the result.

use std::collections::HashSet;

use verdant_core::domain::product::{CatalogProduct, ProductId};

pub(crate) const ID_LABEL: &str = "Recommended product IDs:";

/// Extract up to `limit` candidate ids from `text`, in model order,
/// deduplicated. Ids not present in `candidates` are dropped.
pub(crate) fn extract_ids(
    text: &str,
    candidates: &[CatalogProduct],
    limit: usize,
) -> Vec<ProductId> {
    let allowed: HashSet<i64> =
        candidates.iter().map(|candidate| candidate.product.id.0).collect();

    let lowered = text.to_ascii_lowercase();
    let scan = match lowered.find(&ID_LABEL.to_ascii_lowercase()) {
        Some(index) => &text[index + ID_LABEL.len()..],
        None => text,
    };

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for token in integer_tokens(scan) {
        if allowed.contains(&token) && seen.insert(token) {
            ids.push(ProductId(token));
            if ids.len() == limit {
                break;
            }
        }
    }
    ids
}

/// ASCII digit runs interpreted as integers; runs that overflow i64 are
/// skipped rather than truncated.
fn integer_tokens(text: &str) -> impl Iterator<Item = i64> + '_ {
    text.split(|ch: char| !ch.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .filter_map(|run| run.parse::<i64>().ok())
}
