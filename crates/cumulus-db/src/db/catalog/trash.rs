use chrono::{DateTime, Utc};
use cumulus_core::{models::Resource, AppError};
use sqlx::{PgPool, Postgres};

const RESOURCE_COLUMNS: &str = "id, creator_id, kind, display_name, blob_path, byte_size, \
     captured_at, uploaded_at, trashed_at, favorite";

/// Repository for the trash lifecycle: soft delete, restore, and the rows
/// the purge removes for good
#[derive(Clone)]
pub struct TrashRepository {
    pool: PgPool,
}

impl TrashRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Soft-delete a batch. Only rows the person created and that are not
    /// already trashed are touched; the count of affected rows comes back.
    #[tracing::instrument(skip(self, ids), fields(db.table = "resources", db.operation = "update"))]
    pub async fn trash_batch(&self, person_id: i64, ids: &[i64]) -> Result<u64, AppError> {
        let rows = sqlx::query(
            "UPDATE resources SET trashed_at = NOW() \
             WHERE id = ANY($1) AND creator_id = $2 AND trashed_at IS NULL",
        )
        .bind(ids)
        .bind(person_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows)
    }

    /// Clear `trashed_at`; the resource reappears exactly where it was,
    /// since links and access rows were never touched.
    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "update", db.record_id = %id))]
    pub async fn restore(&self, person_id: i64, id: i64) -> Result<bool, AppError> {
        let rows = sqlx::query(
            "UPDATE resources SET trashed_at = NULL \
             WHERE id = $1 AND creator_id = $2 AND trashed_at IS NOT NULL",
        )
        .bind(id)
        .bind(person_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "select"))]
    pub async fn list_trash(&self, person_id: i64) -> Result<Vec<Resource>, AppError> {
        let resources = sqlx::query_as::<Postgres, Resource>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources \
             WHERE creator_id = $1 AND trashed_at IS NOT NULL \
             ORDER BY trashed_at DESC"
        ))
        .bind(person_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(resources)
    }

    /// Rows trashed before the cutoff, oldest first.
    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "select"))]
    pub async fn select_expired(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Resource>, AppError> {
        let resources = sqlx::query_as::<Postgres, Resource>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources \
             WHERE trashed_at IS NOT NULL AND trashed_at < $1 \
             ORDER BY trashed_at ASC"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(resources)
    }

    /// Remove the Catalog rows of purged resources. Access rows, links, and
    /// share requests cascade. One batch, one transaction.
    #[tracing::instrument(skip(self, ids), fields(db.table = "resources", db.operation = "delete"))]
    pub async fn purge_rows(&self, ids: &[i64]) -> Result<u64, AppError> {
        let rows = sqlx::query("DELETE FROM resources WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows)
    }
}
