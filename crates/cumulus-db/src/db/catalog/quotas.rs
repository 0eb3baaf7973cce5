use cumulus_core::{
    models::{Person, PersonUsage, QuotaUsage},
    AppError,
};
use sqlx::{PgPool, Postgres};

/// Repository for per-person quota caps and usage sums
#[derive(Clone)]
pub struct QuotaRepository {
    pool: PgPool,
}

impl QuotaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "persons", db.operation = "select", db.record_id = %person_id))]
    pub async fn get_person(&self, person_id: i64) -> Result<Option<Person>, AppError> {
        let person = sqlx::query_as::<Postgres, Person>(
            "SELECT id, display_name, email, storage_cap, is_admin, created_at \
             FROM persons WHERE id = $1",
        )
        .bind(person_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(person)
    }

    /// Usage sums the person's non-trashed resource rows. Trashing a
    /// resource frees its quota right away; the purge only reclaims disk.
    #[tracing::instrument(skip(self), fields(db.table = "resources", db.operation = "select"))]
    pub async fn usage(&self, person_id: i64) -> Result<QuotaUsage, AppError> {
        let cap: Option<i64> = sqlx::query_scalar::<Postgres, Option<i64>>(
            "SELECT storage_cap FROM persons WHERE id = $1",
        )
        .bind(person_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Person {}", person_id)))?;

        let used: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(byte_size), 0) FROM resources \
             WHERE creator_id = $1 AND trashed_at IS NULL",
        )
        .bind(person_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(QuotaUsage { used, cap })
    }

    #[tracing::instrument(skip(self), fields(db.table = "persons", db.operation = "update", db.record_id = %person_id))]
    pub async fn set_cap(&self, person_id: i64, cap: Option<i64>) -> Result<bool, AppError> {
        let rows = sqlx::query("UPDATE persons SET storage_cap = $1 WHERE id = $2")
            .bind(cap)
            .bind(person_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Sum of every other user's explicit cap. Unlimited users contribute
    /// nothing here; only the physical ceiling bounds them.
    #[tracing::instrument(skip(self), fields(db.table = "persons", db.operation = "select"))]
    pub async fn sum_other_caps(&self, person_id: i64) -> Result<i64, AppError> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(storage_cap), 0) FROM persons \
             WHERE id != $1 AND storage_cap IS NOT NULL",
        )
        .bind(person_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }

    /// Per-user usage rows for the admin overview.
    #[tracing::instrument(skip(self), fields(db.table = "persons", db.operation = "select"))]
    pub async fn usage_overview(&self) -> Result<Vec<PersonUsage>, AppError> {
        let rows = sqlx::query_as::<Postgres, PersonUsage>(
            "SELECT p.id AS person_id, p.display_name, p.storage_cap, \
                    COALESCE(SUM(r.byte_size), 0) AS used_bytes \
             FROM persons p \
             LEFT JOIN resources r ON r.creator_id = p.id AND r.trashed_at IS NULL \
             GROUP BY p.id, p.display_name, p.storage_cap \
             ORDER BY used_bytes DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
