//! StockLens API server entry point

use std::sync::Arc;
use stocklens_api::app::{build_router, AppState};
use stocklens_api::config::Config;
use stocklens_api::recognition::GeminiGateway;
use stocklens_api::storage::{BucketStore, DisabledStore, PhotoStore};
use stocklens_api::store::PgInventoryStore;
use stocklens_api::workflow::Workflow;
use stocklens_shared::db::migrations::run_migrations;
use stocklens_shared::db::pool::{create_pool, DatabaseConfig};
use stocklens_shared::ledger::PgLedger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stocklens_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(bind = %config.bind_address(), "Starting StockLens API server");

    let db = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    run_migrations(&db).await?;

    let ledger = Arc::new(PgLedger::new(db.clone()));
    let gateway = Arc::new(GeminiGateway::new(config.recognition.clone()));
    let photos: Arc<dyn PhotoStore> = match config.storage.clone() {
        Some(storage) => Arc::new(BucketStore::new(storage)),
        None => {
            tracing::warn!("STORAGE_URL not set, photo uploads disabled");
            Arc::new(DisabledStore)
        }
    };
    let store = Arc::new(PgInventoryStore::new(db.clone()));

    let workflow = Arc::new(Workflow::new(ledger, gateway, photos, store));

    let state = AppState {
        db,
        config: Arc::new(config.clone()),
        workflow,
    };

    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
