use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

use gophermart::accrual::{AccrualClient, AccrualWorker};
use gophermart::config::AppConfig;
use gophermart::db::Database;
use gophermart::gateway::{self, state::AppState};
use gophermart::logging::init_logging;
use gophermart::store::{MemoryStore, PgStore, Store};

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    if config.uses_memory_store() {
        tracing::warn!("Using in-memory store, data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = Database::connect(&config.database_uri)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.init_schema()
        .await
        .context("Failed to initialize database schema")?;
    Ok(Arc::new(PgStore::new(Arc::new(db))))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();
    let _log_guard = init_logging(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        address = %config.run_address,
        accrual = %config.accrual_address,
        "Starting gophermart"
    );

    let store = open_store(&config).await?;

    let client = AccrualClient::new(
        &config.accrual_address,
        config.accrual_timeout(),
        config.accrual_poll_interval(),
    )
    .context("Failed to build accrual client")?;
    let worker = Arc::new(AccrualWorker::new(
        store.clone(),
        Arc::new(client),
        config.accrual_poll_interval(),
    ));

    worker
        .resume_pending()
        .await
        .context("Failed to resume pending orders")?;

    let state = Arc::new(AppState::new(store, worker));
    gateway::run_server(&config.run_address, state)
        .await
        .context("HTTP server failed")?;

    tracing::info!("Gophermart stopped");
    Ok(())
}
