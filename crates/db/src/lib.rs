pub mod cache;
pub mod catalog;
pub mod connection;
pub mod fixtures;
pub mod migrations;

pub use cache::{Clock, ManualClock, SnapshotCache, SystemClock};
pub use catalog::SqlCatalog;
pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoCatalog, SeedSummary};
