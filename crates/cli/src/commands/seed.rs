use crate::commands::{runtime, CliError, CommandResult};
use verdant_core::config::{AppConfig, LoadOptions};
use verdant_db::{connect, migrations, DemoCatalog};

pub fn run() -> CommandResult {
    CommandResult::from_outcome("seed", load())
}

fn load() -> Result<String, CliError> {
    let config = AppConfig::load(LoadOptions::default())?;
    let runtime = runtime()?;

    runtime.block_on(async {
        let pool = connect(&config.database).await.map_err(CliError::Database)?;
        migrations::run_pending(&pool).await.map_err(CliError::Migration)?;

        let summary = DemoCatalog::load(&pool).await.map_err(CliError::Seed)?;
        if !DemoCatalog::verify(&pool).await.map_err(CliError::Seed)? {
            return Err(CliError::SeedVerify);
        }

        pool.close().await;
        Ok(format!(
            "loaded demo catalog: {} products, {} orders (idempotent upsert)",
            summary.products, summary.orders
        ))
    })
}
