use crate::commands::{runtime, CliError, CommandResult};
use verdant_core::config::{AppConfig, LoadOptions};
use verdant_db::{connect, migrations};

pub fn run() -> CommandResult {
    CommandResult::from_outcome("migrate", apply())
}

fn apply() -> Result<String, CliError> {
    let config = AppConfig::load(LoadOptions::default())?;
    let runtime = runtime()?;

    runtime.block_on(async {
        let pool = connect(&config.database).await.map_err(CliError::Database)?;
        migrations::run_pending(&pool).await.map_err(CliError::Migration)?;
        pool.close().await;
        Ok("applied pending migrations".to_string())
    })
}
