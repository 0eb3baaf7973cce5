//! Trash lifecycle: soft delete, restore, and the retention purge.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;

use cumulus_core::{models::Resource, AppError};
use cumulus_db::{ResourceRepository, TrashRepository};
use cumulus_storage::BlobVolume;

use crate::cleanup::DeletionQueue;

/// Outcome of one purge sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct PurgeSummary {
    /// Rows past retention when the sweep started.
    pub scanned: usize,
    /// Catalog rows actually removed.
    pub purged: u64,
    /// Physical delete errors, never fatal to the batch.
    pub failures: usize,
}

pub struct TrashService {
    trash: TrashRepository,
    resources: ResourceRepository,
    volume: BlobVolume,
    deletions: DeletionQueue,
}

impl TrashService {
    pub fn new(
        trash: TrashRepository,
        resources: ResourceRepository,
        volume: BlobVolume,
        deletions: DeletionQueue,
    ) -> Self {
        Self {
            trash,
            resources,
            volume,
            deletions,
        }
    }

    /// Soft-delete one resource. Creator only; trashing an already-trashed
    /// resource is a no-op.
    pub async fn move_to_trash(&self, person_id: i64, resource_id: i64) -> Result<(), AppError> {
        let resource = self.require_owned(person_id, resource_id).await?;
        if resource.is_trashed() {
            return Ok(());
        }
        self.trash.trash_batch(person_id, &[resource_id]).await?;
        Ok(())
    }

    /// Soft-delete a batch in one transaction. Rows the person does not own
    /// are skipped; the count of rows actually trashed comes back.
    pub async fn move_to_trash_batch(
        &self,
        person_id: i64,
        resource_ids: &[i64],
    ) -> Result<u64, AppError> {
        self.trash.trash_batch(person_id, resource_ids).await
    }

    /// Bring a resource back. Links and access rows were never touched, so
    /// it reappears exactly where it was.
    pub async fn restore(&self, person_id: i64, resource_id: i64) -> Result<(), AppError> {
        self.require_owned(person_id, resource_id).await?;
        if !self.trash.restore(person_id, resource_id).await? {
            return Err(AppError::NotFound(format!(
                "Resource {} is not in the trash",
                resource_id
            )));
        }
        Ok(())
    }

    pub async fn list_trash(&self, person_id: i64) -> Result<Vec<Resource>, AppError> {
        self.trash.list_trash(person_id).await
    }

    /// Immediate delete, no trash detour: drop the caller's access row, and
    /// when nobody else holds access, drop the Catalog row and queue the
    /// physical files.
    pub async fn hard_delete(&self, person_id: i64, resource_id: i64) -> Result<(), AppError> {
        let resource = self
            .resources
            .get(resource_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {}", resource_id)))?;

        if !self.resources.has_access(resource_id, person_id).await? {
            return Err(AppError::NotOwner(format!(
                "No access to resource {}",
                resource_id
            )));
        }

        let remaining = self.resources.revoke_access(resource_id, person_id).await?;
        if remaining == 0 && self.resources.delete_row(resource_id).await?.is_some() {
            self.deletions.enqueue(resource.blob_path);
        }
        Ok(())
    }

    /// Remove everything trashed longer than the retention window. Physical
    /// deletes run first and best-effort; the Catalog rows of the whole
    /// batch go in one transaction at the end.
    #[tracing::instrument(skip(self))]
    pub async fn purge_expired(&self, retention_days: i64) -> Result<PurgeSummary, AppError> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days);
        let expired = self.trash.select_expired(cutoff).await?;

        let mut summary = PurgeSummary {
            scanned: expired.len(),
            ..Default::default()
        };
        if expired.is_empty() {
            return Ok(summary);
        }

        let mut ids = Vec::with_capacity(expired.len());
        for resource in &expired {
            ids.push(resource.id);

            if let Err(e) = self.volume.delete_original(&resource.blob_path).await {
                summary.failures += 1;
                tracing::error!(
                    error = %e,
                    resource_id = resource.id,
                    blob = %resource.blob_path,
                    "Failed to delete blob during purge, continuing"
                );
            }
            if let Err(e) = self.volume.delete_thumbnail(&resource.blob_path).await {
                summary.failures += 1;
                tracing::error!(
                    error = %e,
                    resource_id = resource.id,
                    "Failed to delete thumbnail during purge, continuing"
                );
            }
        }

        summary.purged = self.trash.purge_rows(&ids).await?;

        tracing::info!(
            scanned = summary.scanned,
            purged = summary.purged,
            failures = summary.failures,
            "Trash purge completed"
        );
        Ok(summary)
    }

    async fn require_owned(
        &self,
        person_id: i64,
        resource_id: i64,
    ) -> Result<Resource, AppError> {
        let resource = self
            .resources
            .get(resource_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {}", resource_id)))?;
        if resource.creator_id != person_id {
            return Err(AppError::NotOwner(format!(
                "Resource {} belongs to someone else",
                resource_id
            )));
        }
        Ok(resource)
    }
}

/// Background purge scheduler.
pub struct TrashPurger {
    service: Arc<TrashService>,
    interval_secs: u64,
    retention_days: i64,
}

impl TrashPurger {
    pub fn new(service: Arc<TrashService>, interval_secs: u64, retention_days: i64) -> Self {
        Self {
            service,
            interval_secs,
            retention_days,
        }
    }

    /// Start the periodic purge loop. Returns the handle for shutdown.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(self.interval_secs));

            loop {
                tick.tick().await;

                tracing::info!("Starting scheduled trash purge");
                match self.service.purge_expired(self.retention_days).await {
                    Ok(summary) => {
                        tracing::info!(
                            purged = summary.purged,
                            failures = summary.failures,
                            "Scheduled purge finished"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Scheduled purge failed");
                    }
                }
            }
        })
    }
}
