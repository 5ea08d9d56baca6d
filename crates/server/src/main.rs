mod bootstrap;
mod health;
mod routes;

use std::time::Duration;

use anyhow::Result;
use verdant_core::config::{AppConfig, LoadOptions};
use verdant_core::Catalog;

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use verdant_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    // Warm the snapshot off the request path so the first caller does not
    // pay for the full catalog load.
    let catalog = app.catalog.clone();
    tokio::spawn(async move {
        if let Err(error) = catalog.products_with_counts().await {
            tracing::warn!(
                event_name = "system.startup.snapshot_warm_failed",
                error = %error,
                "initial catalog snapshot load failed"
            );
        }
    });

    if app.config.ollama.enabled {
        let warmed = app.engine.prewarm().await;
        tracing::info!(
            event_name = "system.startup.model_prewarm",
            warmed,
            "model prewarm attempted"
        );
    }

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "verdant-server listening"
    );

    let router = routes::router(app.engine.clone()).merge(health::router(app.db_pool.clone()));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!(event_name = "system.server.stopping", "verdant-server stopping");

    let _ = shutdown_tx.send(());
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, server).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            grace_secs = app.config.server.graceful_shutdown_secs,
            "in-flight requests did not drain before the shutdown deadline"
        );
    }

    tracing::info!(event_name = "system.server.stopped", "verdant-server stopped");
    Ok(())
}
