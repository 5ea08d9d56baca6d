//! Prompt construction for the ranking call.
//!
//! Prompts stay short and mechanical on purpose: low temperature plus a
//! rigid answer format gives the parser its best odds. Names and
//! descriptions are truncated so a large candidate pool cannot blow out the
//! context window.

use verdant_core::domain::product::CatalogProduct;
use verdant_core::ranker::RankContext;

use crate::parse::ID_LABEL;

const DESCRIPTION_MAX_CHARS: usize = 80;

pub(crate) fn build(context: &RankContext, candidates: &[CatalogProduct], limit: usize) -> String {
    let mut prompt = String::new();

    match context {
        RankContext::Product(seed) => {
            prompt.push_str(&format!(
                "A shopper in an eco-friendly storefront is viewing \"{}\".\n",
                truncate(&seed.name, DESCRIPTION_MAX_CHARS)
            ));
            if let Some(description) = &seed.description {
                prompt.push_str(&format!(
                    "About this product: {}\n",
                    truncate(description, DESCRIPTION_MAX_CHARS)
                ));
            }
            prompt.push_str(&format!(
                "Pick the {limit} products below they are most likely to want next.\n"
            ));
        }
        RankContext::Order(order) => {
            prompt.push_str("A shopper just completed an order containing:\n");
            for line in &order.lines {
                prompt.push_str(&format!(
                    "- {} x {} ({})\n",
                    line.quantity,
                    truncate(&line.name, DESCRIPTION_MAX_CHARS),
                    line.category
                ));
            }
            prompt.push_str(&format!(
                "Their order spans these categories: {}.\n",
                order.distinct_categories().join(", ")
            ));
            prompt.push_str(&format!(
                "Pick the {limit} follow-up products below they are most likely to want.\n"
            ));
        }
    }

    prompt.push_str("\nCandidate products (id: name - description):\n");
    for candidate in candidates {
        let product = &candidate.product;
        let description = product.description.as_deref().unwrap_or("no description");
        prompt.push_str(&format!(
            "{}: {} - {}\n",
            product.id,
            truncate(&product.name, DESCRIPTION_MAX_CHARS),
            truncate(description, DESCRIPTION_MAX_CHARS)
        ));
    }

    prompt.push_str(&format!(
        "\nAnswer with exactly one line in this form and nothing else:\n{ID_LABEL} \
         <id>, <id>, ...\nUse only ids from the candidate list above.\n"
    ));

    prompt
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
