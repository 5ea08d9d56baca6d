//! Pool construction tuned for the recommendation read path.

use std::time::Duration;

use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions};
use verdant_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Connect using the validated `[database]` section of the application
/// configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Explicit-settings variant for tests and tooling that bypass config
/// loading.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| Box::pin(configure_connection(conn)))
        .connect(database_url)
        .await
}

/// Recommendation reads dominate this pool. WAL lets snapshot scans proceed
/// while the storefront's checkout path appends orders, NORMAL sync is
/// durable enough under WAL for a cache-backed read model, and the busy
/// timeout rides out writer checkpoints instead of surfacing SQLITE_BUSY to
/// a request task.
async fn configure_connection(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for pragma in [
        "PRAGMA foreign_keys = ON",
        "PRAGMA journal_mode = WAL",
        "PRAGMA synchronous = NORMAL",
        "PRAGMA busy_timeout = 5000",
    ] {
        sqlx::query(pragma).execute(&mut *conn).await?;
    }
    Ok(())
}
