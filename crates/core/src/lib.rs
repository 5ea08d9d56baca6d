pub mod catalog;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod ranker;
pub mod selector;

pub use catalog::Catalog;
pub use domain::order::{Order, OrderId, OrderLine};
pub use domain::product::{CatalogProduct, Product, ProductId};
pub use engine::{RecommendationEngine, RecommendationRequest};
pub use errors::{CatalogError, RankerError};
pub use ranker::{RankContext, Ranker};
