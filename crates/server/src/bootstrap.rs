use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use verdant_core::config::{AppConfig, ConfigError, LoadOptions};
use verdant_core::{Catalog, Ranker, RecommendationEngine};
use verdant_db::{connect, migrations, DbPool, SqlCatalog};
use verdant_ranker::OllamaRanker;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub catalog: Arc<SqlCatalog>,
    pub engine: Arc<RecommendationEngine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        "database migrations applied"
    );

    let catalog = Arc::new(SqlCatalog::new(
        db_pool.clone(),
        Duration::from_secs(config.recommendations.cache_ttl_secs),
    ));

    let ranker: Option<Arc<dyn Ranker>> = if config.ollama.enabled {
        Some(Arc::new(OllamaRanker::new(&config.ollama)))
    } else {
        info!(
            event_name = "system.bootstrap.ranker_disabled",
            "llm ranking disabled by configuration, serving deterministic recommendations"
        );
        None
    };

    let engine = Arc::new(
        RecommendationEngine::new(catalog.clone() as Arc<dyn Catalog>, ranker)
            .with_default_limit(config.recommendations.default_limit),
    );

    Ok(Application { config, db_pool, catalog, engine })
}
