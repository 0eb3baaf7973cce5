use chrono::{DateTime, Utc};
use cumulus_core::{
    models::{QuotaUsage, Resource, ResourceKind},
    AppError,
};
use sqlx::{PgPool, Postgres};

use crate::db::transaction::TransactionGuard;

const RESOURCE_COLUMNS: &str = "id, creator_id, kind, display_name, blob_path, byte_size, \
     captured_at, uploaded_at, trashed_at, favorite";

/// Everything the ingest transaction needs to commit one assembled upload.
#[derive(Debug)]
pub struct IngestRequest {
    pub creator_id: i64,
    pub display_name: String,
    pub kind: ResourceKind,
    pub blob_path: String,
    pub byte_size: i64,
    pub target_album: Option<i64>,
    pub replace: bool,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Result of a committed ingest. `replaced_blob` is the previous blob name
/// when an existing row was overwritten; its physical files are the caller's
/// to clean up after commit.
#[derive(Debug)]
pub struct IngestOutcome {
    pub resource: Resource,
    pub replaced_blob: Option<String>,
}

/// Repository for uploaded resources and their access set
#[derive(Clone)]
pub struct ResourceRepository {
    pool: PgPool,
}

impl ResourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Commit one assembled upload: quota admission, duplicate resolution,
    /// and the insert (or replace) run in a single transaction, serialized
    /// per user with an advisory lock so concurrent uploads cannot both
    /// slip under the cap.
    #[tracing::instrument(skip(self, req), fields(db.table = "resources", db.operation = "insert", user_id = req.creator_id))]
    pub async fn ingest(&self, req: IngestRequest) -> Result<IngestOutcome, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(req.creator_id)
            .execute(&mut **tx)
            .await?;

        let cap: Option<i64> = sqlx::query_scalar::<Postgres, Option<i64>>(
            "SELECT storage_cap FROM persons WHERE id = $1",
        )
        .bind(req.creator_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Person {}", req.creator_id)))?;

        let used: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(byte_size), 0) FROM resources \
             WHERE creator_id = $1 AND trashed_at IS NULL",
        )
        .bind(req.creator_id)
        .fetch_one(&mut **tx)
        .await?;

        let usage = QuotaUsage { used, cap };
        if !usage.fits(req.byte_size) {
            return Err(AppError::QuotaExceeded {
                used,
                cap: cap.unwrap_or_default(),
                requested: req.byte_size,
            });
        }

        let existing = Self::find_duplicate_in(
            &mut tx,
            req.creator_id,
            &req.display_name,
            req.target_album,
        )
        .await?;

        if let Some(existing) = existing {
            if !req.replace {
                return Err(AppError::DuplicateName(req.display_name));
            }

            let resource = sqlx::query_as::<Postgres, Resource>(&format!(
                "UPDATE resources SET kind = $1, blob_path = $2, byte_size = $3, \
                 captured_at = $4, uploaded_at = NOW(), trashed_at = NULL \
                 WHERE id = $5 RETURNING {RESOURCE_COLUMNS}"
            ))
            .bind(req.kind)
            .bind(&req.blob_path)
            .bind(req.byte_size)
            .bind(req.captured_at)
            .bind(existing.id)
            .fetch_one(&mut **tx)
            .await?;

            tx.commit().await?;
            return Ok(IngestOutcome {
                resource,
                replaced_blob: Some(existing.blob_path),
            });
        }

        let resource = sqlx::query_as::<Postgres, Resource>(&format!(
            "INSERT INTO resources (creator_id, kind, display_name, blob_path, byte_size, captured_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RESOURCE_COLUMNS}"
        ))
        .bind(req.creator_id)
        .bind(req.kind)
        .bind(&req.display_name)
        .bind(&req.blob_path)
        .bind(req.byte_size)
        .bind(req.captured_at)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query("INSERT INTO resource_access (resource_id, person_id) VALUES ($1, $2)")
            .bind(resource.id)
            .bind(req.creator_id)
            .execute(&mut **tx)
            .await?;

        if let Some(album_id) = req.target_album {
            sqlx::query("INSERT INTO resource_albums (resource_id, album_id) VALUES ($1, $2)")
                .bind(resource.id)
                .bind(album_id)
                .execute(&mut **tx)
                .await?;
        }

        tx.commit().await?;
        Ok(IngestOutcome {
            resource,
            replaced_blob: None,
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Resource>, AppError> {
        let resource = sqlx::query_as::<Postgres, Resource>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(resource)
    }

    /// Same-name lookup used by rename. The upload path does the same lookup
    /// inside its own transaction.
    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "select"))]
    pub async fn find_duplicate(
        &self,
        creator_id: i64,
        display_name: &str,
        album: Option<i64>,
    ) -> Result<Option<Resource>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let found = Self::find_duplicate_in(&mut tx, creator_id, display_name, album).await?;
        tx.commit().await?;
        Ok(found)
    }

    async fn find_duplicate_in(
        tx: &mut TransactionGuard<'_>,
        creator_id: i64,
        display_name: &str,
        album: Option<i64>,
    ) -> Result<Option<Resource>, AppError> {
        let found = match album {
            Some(album_id) => {
                sqlx::query_as::<Postgres, Resource>(&format!(
                    "SELECT r.{} FROM resources r \
                     JOIN resource_albums ra ON ra.resource_id = r.id \
                     WHERE ra.album_id = $1 AND r.creator_id = $2 \
                       AND r.display_name = $3 AND r.trashed_at IS NULL",
                    RESOURCE_COLUMNS.replace(", ", ", r.")
                ))
                .bind(album_id)
                .bind(creator_id)
                .bind(display_name)
                .fetch_optional(&mut ***tx)
                .await?
            }
            // Root means no album link at all.
            None => {
                sqlx::query_as::<Postgres, Resource>(&format!(
                    "SELECT {RESOURCE_COLUMNS} FROM resources r \
                     WHERE r.creator_id = $1 AND r.display_name = $2 \
                       AND r.trashed_at IS NULL \
                       AND NOT EXISTS (SELECT 1 FROM resource_albums ra WHERE ra.resource_id = r.id)"
                ))
                .bind(creator_id)
                .bind(display_name)
                .fetch_optional(&mut ***tx)
                .await?
            }
        };

        Ok(found)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "update", db.record_id = %id))]
    pub async fn update_display_name(&self, id: i64, name: &str) -> Result<Resource, AppError> {
        let resource = sqlx::query_as::<Postgres, Resource>(&format!(
            "UPDATE resources SET display_name = $1 WHERE id = $2 RETURNING {RESOURCE_COLUMNS}"
        ))
        .bind(name)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(resource)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "update", db.record_id = %id))]
    pub async fn set_favorite(&self, id: i64, favorite: bool) -> Result<bool, AppError> {
        let rows = sqlx::query("UPDATE resources SET favorite = $1 WHERE id = $2")
            .bind(favorite)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "update", db.record_id = %id))]
    pub async fn set_captured_at(
        &self,
        id: i64,
        captured_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        let rows = sqlx::query("UPDATE resources SET captured_at = $1 WHERE id = $2")
            .bind(captured_at)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_access", db.operation = "insert"))]
    pub async fn grant_access(&self, resource_id: i64, person_id: i64) -> Result<bool, AppError> {
        let rows = sqlx::query(
            "INSERT INTO resource_access (resource_id, person_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(resource_id)
        .bind(person_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// Remove one person's access row and report how many remain. A zero
    /// return makes the resource an orphan; the caller decides what to do
    /// with the row and the blob.
    #[tracing::instrument(skip(self), fields(db.table = "resource_access", db.operation = "delete"))]
    pub async fn revoke_access(&self, resource_id: i64, person_id: i64) -> Result<i64, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        sqlx::query("DELETE FROM resource_access WHERE resource_id = $1 AND person_id = $2")
            .bind(resource_id)
            .bind(person_id)
            .execute(&mut **tx)
            .await?;

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM resource_access WHERE resource_id = $1")
                .bind(resource_id)
                .fetch_one(&mut **tx)
                .await?;

        tx.commit().await?;
        Ok(remaining)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_access", db.operation = "delete"))]
    pub async fn revoke_all_except(
        &self,
        resource_id: i64,
        keep_person: i64,
    ) -> Result<u64, AppError> {
        let rows = sqlx::query(
            "DELETE FROM resource_access WHERE resource_id = $1 AND person_id != $2",
        )
        .bind(resource_id)
        .bind(keep_person)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_access", db.operation = "select"))]
    pub async fn has_access(&self, resource_id: i64, person_id: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM resource_access WHERE resource_id = $1 AND person_id = $2)",
        )
        .bind(resource_id)
        .bind(person_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Delete the row outright. Access rows, album links, and share requests
    /// go with it via cascade. Returns the blob name so the caller can queue
    /// the physical files.
    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_row(&self, id: i64) -> Result<Option<String>, AppError> {
        let blob: Option<String> =
            sqlx::query_scalar("DELETE FROM resources WHERE id = $1 RETURNING blob_path")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(blob)
    }

    /// The album a resource is linked into, if any. `None` means the
    /// uploader's root.
    #[tracing::instrument(skip(self), fields(db.table = "resource_albums", db.operation = "select"))]
    pub async fn linked_album(&self, resource_id: i64) -> Result<Option<i64>, AppError> {
        let album: Option<i64> = sqlx::query_scalar(
            "SELECT album_id FROM resource_albums WHERE resource_id = $1 LIMIT 1",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(album)
    }

    /// Resources the person can see in their root: access row, no album
    /// link, not trashed.
    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "select"))]
    pub async fn list_root_for(&self, person_id: i64) -> Result<Vec<Resource>, AppError> {
        let resources = sqlx::query_as::<Postgres, Resource>(&format!(
            "SELECT r.{} FROM resources r \
             JOIN resource_access a ON a.resource_id = r.id \
             WHERE a.person_id = $1 AND r.trashed_at IS NULL \
               AND NOT EXISTS (SELECT 1 FROM resource_albums ra WHERE ra.resource_id = r.id) \
             ORDER BY r.uploaded_at DESC",
            RESOURCE_COLUMNS.replace(", ", ", r.")
        ))
        .bind(person_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(resources)
    }
}
