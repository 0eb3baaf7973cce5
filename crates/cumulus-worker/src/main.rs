//! Background worker: trash purge, stale upload-session reaping, and the
//! deletion queue consumer. Runs alongside whatever edge serves requests.

mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use cumulus_core::Config;
use cumulus_db::{ResourceRepository, TrashRepository};
use cumulus_services::{start_deletion_worker, DeletionQueue, TrashPurger, TrashService};
use cumulus_storage::{BlobVolume, ChunkSessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();

    let config = Config::from_env()?;
    tracing::info!(environment = %config.environment, "Starting cumulus worker");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../cumulus-db/migrations").run(&pool).await?;

    let volume = BlobVolume::new(&config.uploads_root, &config.thumbnails_root).await?;
    let chunks = ChunkSessionStore::new(&config.chunk_temp_dir).await?;

    let (deletions, deletion_rx) = DeletionQueue::new();
    let deletion_handle = start_deletion_worker(volume.clone(), deletion_rx);

    let trash_service = Arc::new(TrashService::new(
        TrashRepository::new(pool.clone()),
        ResourceRepository::new(pool.clone()),
        volume.clone(),
        deletions.clone(),
    ));
    let purger = TrashPurger::new(
        Arc::clone(&trash_service),
        config.purge_interval_secs,
        config.trash_retention_days,
    );
    let purge_handle = purger.start();

    let reap_handle = cumulus_services::start_session_reaper(
        chunks,
        Duration::from_secs(config.upload_session_ttl_secs),
        config.upload_session_ttl_secs.max(60),
    );

    tracing::info!("Worker tasks running, waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping worker tasks");

    purge_handle.abort();
    reap_handle.abort();
    drop(deletions);
    drop(trash_service);
    let _ = deletion_handle.await;

    Ok(())
}
